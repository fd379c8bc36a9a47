use std::time::Duration;

/// Formats an elapsed duration as `HH:MM:SS,mmm`.
pub fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    let (hours, minutes, secs) = (secs / 3600, secs % 3600 / 60, secs % 60);
    format!("{:02}:{:02}:{:02},{:03}", hours, minutes, secs, elapsed.subsec_millis())
}

pub fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

/// Short, log-safe preview of a secret value.
pub fn preview_secret(val: &str) -> String {
    let n = val.chars().take(5).map(char::len_utf8).sum::<usize>();
    format!("{}...({} chars)", &val[..n], val.chars().count())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_elapsed_time() {
        assert_eq!(format_elapsed(Duration::from_millis(0)), "00:00:00,000");
        assert_eq!(
            format_elapsed(Duration::from_millis(3_723_456)),
            "01:02:03,456"
        );
        assert_eq!(format_elapsed(Duration::from_micros(59_999_999)), "00:00:59,999");
    }

    #[test]
    fn escapes_markup() {
        assert_eq!(
            html_escape(r#"<a href="x">Tom & 'Jerry'</a>"#),
            "&lt;a href=&quot;x&quot;&gt;Tom &amp; &#39;Jerry&#39;&lt;/a&gt;"
        );
    }

    #[test]
    fn previews_only_prefix_of_secret() {
        assert_eq!(preview_secret("AIzaSyExample"), "AIzaS...(13 chars)");
        assert_eq!(preview_secret("abc"), "abc...(3 chars)");
    }
}
