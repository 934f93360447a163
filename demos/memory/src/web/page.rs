use axum::response::Html;

pub fn render(title: &str, message: Option<&str>, body: &str) -> Html<String> {
    let message = message
        .map(|message| format!("<p><strong>{message}</strong></p>"))
        .unwrap_or_default();

    Html(format!(
        "<!doctype html><html><head><title>{title}</title></head>\
         <body><h1>{title}</h1>{message}{body}</body></html>"
    ))
}
