use std::time::Duration;

use crate::upload::VideoFormat;
use crate::utilities::{format_elapsed, html_escape};

pub const PAGE_TITLE: &str = "Video AI Summarizer";
pub const QUERY_LABEL: &str = "What insights are you seeking from this video?";
pub const QUERY_PLACEHOLDER: &str = "Ask anything about the video content. The AI Agent will analyze the content and give additional information to you";
pub const QUERY_HELP: &str = "Provide specific questions or insights you want from the video";
pub const UPLOAD_INFO: &str = "Upload a video file for analysis";

/// What to show in the result area after a submission.
#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    Result {
        text: String,
        file_name: String,
        elapsed: Duration,
    },
    Warning(String),
    Error(String),
}

#[derive(Debug, Clone, Default)]
pub struct PageView<'a> {
    pub model: &'a str,
    pub config_error: Option<&'a str>,
    pub query: &'a str,
    pub notice: Option<Notice>,
}

/// Render the single-page UI.
pub fn render_page(view: &PageView<'_>) -> String {
    let mut content = String::new();

    content.push_str(&format!(
        r#"<div class="header"><h1>{title} 🎥🕵️</h1><h2>Powered by {model}</h2></div>
<div class="container">
"#,
        title = PAGE_TITLE,
        model = html_escape(view.model),
    ));

    if let Some(err) = view.config_error {
        content.push_str(&format!(
            r#"<div class="error" id="config-error">⚠️ {}</div>"#,
            html_escape(err)
        ));
    }

    content.push_str(&format!(
        r#"
<form id="analyze-form" action="/analyze" method="post" enctype="multipart/form-data">
    <label for="video">Upload a video file</label>
    <input type="file" id="video" name="video" accept="{accept}" title="Upload a video for AI Analysis" required>
    <p class="info" id="upload-info">{info}</p>
    <video id="preview" controls hidden></video>
    <label for="query">{label}</label>
    <textarea id="query" name="query" placeholder="{placeholder}" title="{help}">{query}</textarea>
    <button type="submit">🔍 Analyze video</button>
</form>
<div class="spinner" id="spinner" hidden>Processing video and gathering insights...</div>
<div id="result">"#,
        accept = VideoFormat::ACCEPT,
        info = UPLOAD_INFO,
        label = QUERY_LABEL,
        placeholder = html_escape(QUERY_PLACEHOLDER),
        help = html_escape(QUERY_HELP),
        query = html_escape(view.query),
    ));

    if let Some(notice) = &view.notice {
        content.push_str(&render_notice(notice));
    }

    content.push_str("</div>\n</div>\n");
    build_page(PAGE_TITLE, &content)
}

pub fn render_notice(notice: &Notice) -> String {
    match notice {
        Notice::Result {
            text,
            file_name,
            elapsed,
        } => format!(
            r#"<h3>Analysis Result</h3>
<div class="markdown"><pre class="markdown-source">{}</pre></div>
<p class="meta">{} analyzed in {}</p>"#,
            html_escape(text),
            html_escape(file_name),
            format_elapsed(*elapsed),
        ),
        Notice::Warning(msg) => format!(r#"<div class="warning">{}</div>"#, html_escape(msg)),
        Notice::Error(msg) => format!(r#"<div class="error">{}</div>"#, html_escape(msg)),
    }
}

const STYLE: &str = r#"
*{margin:0;padding:0;box-sizing:border-box;}
body{font-family:-apple-system,BlinkMacSystemFont,"Segoe UI",Roboto,sans-serif;color:#1a1a1a;background:#fafafa;}
.header{background:#1a1a1a;color:#fff;padding:16px 24px;}
.header h1{font-size:22px;font-weight:600;}
.header h2{font-size:14px;font-weight:400;color:#ccc;margin-top:4px;}
.container{max-width:960px;margin:0 auto;padding:24px;}
form{background:#fff;border:1px solid #e0e0e0;border-radius:8px;padding:20px;margin-bottom:20px;}
label{display:block;font-weight:600;margin:12px 0 6px;}
input[type=file]{margin-bottom:8px;}
textarea{width:100%;height:100px;padding:8px;border:1px solid #ddd;border-radius:4px;font:inherit;}
button{margin-top:12px;background:#0066cc;color:#fff;padding:10px 16px;border:none;border-radius:4px;cursor:pointer;font-size:14px;}
button:disabled{background:#999;cursor:wait;}
video{width:100%;max-height:420px;margin:8px 0;border-radius:4px;background:#000;}
.info{background:#e3f2fd;color:#1565c0;padding:8px 12px;border-radius:4px;font-size:13px;}
.warning{background:#fff8e1;border:1px solid #ffecb3;color:#795548;padding:8px 12px;border-radius:4px;margin-bottom:12px;}
.error{background:#fce4ec;border:1px solid #f8bbd0;color:#c62828;padding:8px 12px;border-radius:4px;margin-bottom:12px;}
.spinner{color:#555;font-style:italic;margin-bottom:12px;}
#result h3{font-size:18px;margin-bottom:8px;}
.markdown{background:#fff;border:1px solid #e0e0e0;border-radius:8px;padding:16px;line-height:1.5;}
.markdown pre.markdown-source{white-space:pre-wrap;font-family:inherit;}
.markdown h1,.markdown h2,.markdown h3{margin:12px 0 6px;}
.markdown ul,.markdown ol{margin:6px 0 6px 24px;}
.meta{font-size:12px;color:#888;margin-top:8px;}
"#;

const SCRIPT: &str = r#"
<script src="https://cdn.jsdelivr.net/npm/marked/marked.min.js"></script>
<script src="https://cdn.jsdelivr.net/npm/dompurify/dist/purify.min.js"></script>
<script>
function renderMarkdown(root) {
    if (!window.marked || !window.DOMPurify) return;
    root.querySelectorAll('pre.markdown-source').forEach(pre => {
        const div = document.createElement('div');
        div.innerHTML = DOMPurify.sanitize(marked.parse(pre.textContent));
        pre.replaceWith(div);
    });
}

function escapeHtml(s) {
    const d = document.createElement('div');
    d.textContent = s;
    return d.innerHTML;
}

const form = document.getElementById('analyze-form');
const input = document.getElementById('video');
const preview = document.getElementById('preview');
const info = document.getElementById('upload-info');
const spinner = document.getElementById('spinner');
const result = document.getElementById('result');

input.addEventListener('change', () => {
    const file = input.files[0];
    if (preview.src) URL.revokeObjectURL(preview.src);
    if (file) {
        preview.src = URL.createObjectURL(file);
        preview.hidden = false;
        info.hidden = true;
    } else {
        preview.removeAttribute('src');
        preview.hidden = true;
        info.hidden = false;
    }
});

form.addEventListener('submit', async (event) => {
    event.preventDefault();
    const button = form.querySelector('button');
    button.disabled = true;
    spinner.hidden = false;
    result.innerHTML = '';
    try {
        const response = await fetch('/api/analyze', { method: 'POST', body: new FormData(form) });
        const data = await response.json();
        if (data.status === 'success') {
            result.innerHTML = '<h3>Analysis Result</h3><div class="markdown"><pre class="markdown-source">'
                + escapeHtml(data.result) + '</pre></div>';
        } else {
            const cls = data.status === 'warning' ? 'warning' : 'error';
            result.innerHTML = '<div class="' + cls + '">' + escapeHtml(data.error) + '</div>';
        }
    } catch (err) {
        result.innerHTML = '<div class="error">An error occurred during analysis: ' + escapeHtml(String(err)) + '</div>';
    } finally {
        spinner.hidden = true;
        button.disabled = false;
        renderMarkdown(result);
    }
});

renderMarkdown(document);
</script>
"#;

fn build_page(title: &str, content: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{title}</title>
<style>{style}</style>
</head>
<body>
{content}
{script}
</body>
</html>"#,
        title = html_escape(title),
        style = STYLE,
        script = SCRIPT,
    )
}
