use crate::config::{DEFAULT_MAX_RESULTS, WIKI_BASE_URL};
use crate::SearchResult;
use html_escape::{encode_double_quoted_attribute, encode_text};
use std::fmt::Write;

const STYLE: &str = r#"
body { font-family: -apple-system, "Segoe UI", Helvetica, Arial, sans-serif; margin: 0; color: #222; }
.header { display: flex; align-items: center; gap: 6px; padding: 12px 16px; background: #f6f6f6; font-weight: 600; }
.header-logo { width: 24px; height: 24px; }
.logo-this { color: #3366cc; }
.header-title { margin-left: auto; font-weight: 400; color: #666; }
.query { margin: 12px 16px; white-space: pre-wrap; }
.query-title { font-size: 12px; text-transform: uppercase; color: #888; }
.results { padding: 0 16px 16px; }
.result a { display: flex; justify-content: space-between; padding: 10px 0; border-bottom: 1px solid #eee; color: inherit; text-decoration: none; }
.result-title { font-size: 16px; }
.result-meta span { margin-right: 12px; font-size: 12px; color: #666; }
"#;

/// Renders a ranked result list into a standalone results page.
#[derive(Debug, Clone)]
pub struct ResultPresenter {
    wiki_base_url: String,
    max_results: usize,
}

impl Default for ResultPresenter {
    fn default() -> Self {
        Self::new(WIKI_BASE_URL, DEFAULT_MAX_RESULTS)
    }
}

impl ResultPresenter {
    pub fn new(wiki_base_url: impl Into<String>, max_results: usize) -> Self {
        Self {
            wiki_base_url: wiki_base_url.into().trim_end_matches('/').to_string(),
            max_results,
        }
    }

    pub fn article_url(&self, page_title: &str) -> String {
        format!("{}/{}", self.wiki_base_url, urlencoding::encode(page_title))
    }

    /// Keeps the first `max_results` entries in the order given.
    pub fn render(&self, query: &str, results: &[SearchResult], base_asset_url: &str) -> String {
        let mut items = String::new();
        for result in results.iter().take(self.max_results) {
            // Writing into a String cannot fail.
            let _ = write!(
                items,
                r#"
      <article class="result">
        <a href="{href}" target="_blank">
          <div class="result-content">
            <div class="result-title">{title}</div>
            <div class="result-meta">
              <span class="result-score">🎯{score:.2}</span>
              <span class="result-views">👁️{views}</span>
            </div>
          </div>
          <div class="button">🔍</div>
        </a>
      </article>"#,
                href = encode_double_quoted_attribute(&self.article_url(&result.page_title)),
                title = encode_text(&result.page_title),
                score = result.score,
                views = result.views,
            );
        }

        format!(
            r#"<!DOCTYPE html>
<html>
  <head>
    <meta charset="utf-8" />
    <title>WikiWhatsThis - Results</title>
    <style>{STYLE}</style>
  </head>
  <body>
    <header class="header">
      <img class="header-logo" src="{icon}" /> WikiWhats<span class="logo-this">This</span> <span class="header-title">Results</span>
    </header>
    <pre class="query">
      <div class="query-title">Query</div>
      <div class="query-content">{query}</div>
    </pre>
    <section class="results">{items}
    </section>
  </body>
</html>
"#,
            icon = encode_double_quoted_attribute(&format!("{base_asset_url}icon.png")),
            query = encode_text(query),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(page_id: i64, title: &str, score: f64) -> SearchResult {
        SearchResult {
            page_id,
            page_title: title.to_string(),
            item_id: page_id * 10,
            score,
            views: 100 + page_id as u64,
            in_link_count: 1,
            out_link_count: 1,
            isa_featured_article: false,
            isa_good_article: false,
        }
    }

    fn rendered_titles(markup: &str) -> Vec<String> {
        markup
            .split(r#"<div class="result-title">"#)
            .skip(1)
            .filter_map(|rest| rest.split("</div>").next())
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn renders_engine_answer_for_query() -> Result<(), serde_json::Error> {
        let results: Vec<SearchResult> = serde_json::from_str(
            r#"[{"page_id":1,"page_title":"Ada_Lovelace","item_id":10,"score":0.97,"views":5000,"in_link_count":50,"out_link_count":20,"isa_featured_article":true,"isa_good_article":false}]"#,
        )?;

        let markup = ResultPresenter::default().render("Ada Lovelace", &results, "ext://base/");

        assert!(markup.contains(r#"<div class="query-content">Ada Lovelace</div>"#));
        assert!(markup.contains("Ada_Lovelace"));
        assert!(markup.contains("🎯0.97"));
        assert!(markup.contains("👁️5000"));
        assert!(markup.contains(r#"href="https://en.wikipedia.org/wiki/Ada_Lovelace""#));
        assert!(markup.contains(r#"src="ext://base/icon.png""#));
        Ok(())
    }

    #[test]
    fn long_lists_keep_first_ten_in_input_order() {
        // Deliberately not sorted by score.
        let results: Vec<SearchResult> = (0..12)
            .map(|index| result(index, &format!("Title_{index}"), (index % 3) as f64))
            .collect();

        let markup = ResultPresenter::default().render("q", &results, "");

        let expected: Vec<String> = (0..10).map(|index| format!("Title_{index}")).collect();
        assert_eq!(rendered_titles(&markup), expected);
    }

    #[test]
    fn short_lists_render_every_entry() {
        let results = vec![result(2, "Beta", 0.1), result(1, "Alpha", 0.9)];

        let markup = ResultPresenter::default().render("q", &results, "");

        assert_eq!(rendered_titles(&markup), ["Beta", "Alpha"]);

        let empty = ResultPresenter::default().render("q", &[], "");
        assert!(rendered_titles(&empty).is_empty());
    }

    #[test]
    fn text_is_escaped_and_links_are_encoded() {
        let results = vec![result(1, "AT&T <Corp>", 1.005)];

        let markup = ResultPresenter::default().render("<script>alert(1)</script>", &results, "");

        assert!(!markup.contains("<script>"));
        assert!(markup.contains("&lt;script&gt;"));
        assert!(markup.contains("AT&amp;T &lt;Corp&gt;"));
        assert!(markup.contains("https://en.wikipedia.org/wiki/AT%26T%20%3CCorp%3E"));
    }

    #[test]
    fn limit_is_configurable() {
        let results: Vec<SearchResult> = (0..5).map(|index| result(index, "T", 0.5)).collect();

        let markup = ResultPresenter::new("https://de.wikipedia.org/wiki/", 3).render("q", &results, "");

        assert_eq!(rendered_titles(&markup).len(), 3);
        assert_eq!(
            ResultPresenter::new("https://de.wikipedia.org/wiki/", 3).article_url("Köln"),
            "https://de.wikipedia.org/wiki/K%C3%B6ln"
        );
    }
}
