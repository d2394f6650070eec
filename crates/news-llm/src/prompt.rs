//! Prompt construction, §4.9 steps 4 and 5. Wording preserved verbatim from
//! the reference implementation, including the retry template's concrete
//! `AAPL` example — an Open Question in the originating spec notes this may
//! bias the model toward that ticker, but instructs against "fixing" it.

/// `Title:` / `URL:` / `Content:` labelled lines, skipping absent fields.
pub fn build_input_text(title: &str, url: Option<&str>, content: Option<&str>) -> String {
    let mut parts = vec![format!("Title: {title}")];
    if let Some(url) = url {
        parts.push(format!("URL: {url}"));
    }
    if let Some(content) = content {
        parts.push(format!("Content: {content}"));
    }
    parts.join("\n")
}

/// The `k=0` prompt.
pub fn build_prompt(input_text: &str) -> String {
    format!(
        "You are a financial news analyst. Analyze the news below and output ONLY valid JSON with keys: \
         tickers (list of strings), sentiment (positive|neutral|negative), \
         confidence (0..1), reasoning_summary (<=280 chars). \
         No markdown, no extra text.\n\nNEWS:\n{input_text}\n"
    )
}

/// The `k>=1` prompt.
pub fn build_retry_prompt(input_text: &str) -> String {
    let template = r#"{"tickers":["AAPL"],"sentiment":"neutral","confidence":0.5,"reasoning_summary":"Short reason."}"#;
    format!(
        "STRICT MODE: Output ONLY JSON matching this exact schema. \
         Do not include any extra keys, markdown, or commentary.\nTEMPLATE:\n{template}\n\nNEWS:\n{input_text}\n"
    )
}
