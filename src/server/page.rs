//! HTML for the upload, result and error pages.

use axum::http::StatusCode;
use base64::Engine;

use super::DOWNLOAD_FILENAME;

const STYLE: &str = r"
body {
    font-family: 'Segoe UI', Tahoma, Geneva, Verdana, sans-serif;
    max-width: 960px;
    margin: 0 auto;
    padding: 24px;
}
.header-text, .title-text {
    font-size: 48px;
    background: linear-gradient(to right, #00C9FF, #92FE9D);
    -webkit-background-clip: text;
    background-clip: text;
    color: transparent;
    font-weight: bold;
    text-align: center;
    margin-bottom: 30px;
}
.subheader-text {
    font-size: 32px;
    background: linear-gradient(to right, #FF512F, #F09819);
    -webkit-background-clip: text;
    background-clip: text;
    color: transparent;
    font-weight: bold;
    text-align: center;
    margin-bottom: 20px;
}
.colorized-container, .input-container { text-align: center; margin-bottom: 20px; }
.colorized-image, .input-image {
    border-radius: 10px;
    padding: 10px;
    box-shadow: 0 0 10px rgba(0, 0, 0, 0.1);
}
.colorized-image { border: 2px solid #00C9FF; }
.input-image { border: 2px solid #92FE9D; }
img { max-width: 100%; }
.error { color: #b00020; text-align: center; }
";

fn layout(body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n\
         <title>IMAGE COLORIZER</title>\n<style>{STYLE}</style>\n</head>\n<body>\n\
         <p class=\"header-text\">IMAGE COLORIZER</p>\n\
         <p class=\"subheader-text\">Add colors to your black-and-white images!</p>\n\
         {body}\n</body>\n</html>\n"
    )
}

fn upload_form() -> &'static str {
    "<h3>Please upload an image.</h3>\n\
     <form action=\"/colorize\" method=\"post\" enctype=\"multipart/form-data\">\n\
     <input type=\"file\" name=\"file\" accept=\"image/*\" required>\n\
     <button type=\"submit\">Submit image</button>\n\
     </form>"
}

/// The landing page with the upload form.
pub fn upload_page() -> String {
    layout(upload_form())
}

/// The colorized image, the input image, and a download link.
///
/// The link carries the PNG itself, so it keeps working after the result leaves the cache.
pub fn result_page(output_png: &[u8], input_png: &[u8]) -> String {
    let engine = base64::engine::general_purpose::STANDARD;
    let output = engine.encode(output_png);
    let input = engine.encode(input_png);

    layout(&format!(
        "{form}\n\
         <div class=\"colorized-container\"><p class=\"colorized-image\">Colorized Image</p>\n\
         <img alt=\"Colorized image\" src=\"data:image/png;base64,{output}\"></div>\n\
         <div class=\"input-container\"><p class=\"input-image\">Input Image</p>\n\
         <img alt=\"Input image\" src=\"data:image/png;base64,{input}\"></div>\n\
         <p style=\"text-align: center\"><a href=\"data:image/png;base64,{output}\" \
         download=\"{DOWNLOAD_FILENAME}\">Download Colorized Image</a></p>",
        form = upload_form(),
    ))
}

/// A failure message with the form so the user can try again.
pub fn error_page(status: StatusCode, message: &str) -> String {
    layout(&format!(
        "<p class=\"error\">{status}: {}</p>\n{}",
        escape_html(message),
        upload_form()
    ))
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}
