//! Built-in assistant actions
//!
//! Each builtin performs its side effect directly and returns a
//! human-readable result string for injection. Browser actions go through
//! xdg-open; the weather lookup hits wttr.in for a one-line report.

use super::calc;
use std::time::Duration;

/// One-line weather report from wttr.in
pub async fn get_weather() -> String {
    let result = tokio::task::spawn_blocking(|| {
        ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(5))
            .build()
            .get("https://wttr.in/?format=3")
            .call()
            .and_then(|resp| resp.into_string().map_err(ureq::Error::from))
    })
    .await;

    match result {
        Ok(Ok(body)) => format!("當前天氣：{}", body.trim()),
        Ok(Err(e)) => {
            tracing::warn!("Weather lookup failed: {}", e);
            format!("無法獲取天氣資訊：{}", e)
        }
        Err(_) => "天氣伺服器暫時沒有回應。".to_string(),
    }
}

/// Current local time, formatted for dictation
pub fn get_current_time() -> String {
    let now = chrono::Local::now();
    format!("現在時間是：{}", now.format("%Y-%m-%d %H:%M:%S"))
}

/// Open a Google search for the query in the default browser
pub async fn open_search(query: &str) -> String {
    if query.is_empty() {
        return "請提供搜尋關鍵字。".to_string();
    }
    let url = format!("https://www.google.com/search?q={}", query);
    match open_in_browser(&url).await {
        Ok(()) => format!("已在瀏覽器開啟 Google 搜尋：{}", query),
        Err(e) => format!("無法開啟瀏覽器：{}", e),
    }
}

/// Open a website in the default browser, prefixing https:// if needed
pub async fn open_website(site: &str) -> String {
    let url = if site.starts_with("http") {
        site.to_string()
    } else {
        format!("https://{}", site)
    };
    match open_in_browser(&url).await {
        Ok(()) => format!("已開啟網頁：{}", url),
        Err(e) => format!("無法開啟網頁：{}", e),
    }
}

/// Evaluate a spoken arithmetic expression
pub fn run_calculator(expr: &str) -> String {
    let sanitized = calc::sanitize(expr);
    match calc::evaluate(&sanitized) {
        Some(value) => format!("計算結果：{} = {}", expr, calc::format_result(value)),
        None => format!("抱歉，我算不出來：{}", expr),
    }
}

async fn open_in_browser(url: &str) -> Result<(), String> {
    let status = tokio::process::Command::new("xdg-open")
        .arg(url)
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .status()
        .await
        .map_err(|e| e.to_string())?;

    if status.success() {
        Ok(())
    } else {
        Err(format!("xdg-open exited with {:?}", status.code()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_current_time_has_prefix() {
        let text = get_current_time();
        assert!(text.starts_with("現在時間是："));
    }

    #[test]
    fn test_run_calculator() {
        assert_eq!(run_calculator("3加5"), "計算結果：3加5 = 8");
        assert!(run_calculator("無法計算的東西").starts_with("抱歉"));
    }

    #[tokio::test]
    async fn test_open_search_empty_query() {
        assert_eq!(open_search("").await, "請提供搜尋關鍵字。");
    }
}
