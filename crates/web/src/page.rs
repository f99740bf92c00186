//! HTML pages for the upload form and action results

use std::fmt::Write as _;

use epubseal_common::engine::ValidationSummary;
use epubseal_common::{EpubPackageInfo, Report};

const STYLE: &str = r#"
      body { font-family: -apple-system, BlinkMacSystemFont, "Segoe UI", sans-serif; margin: 24px; color: #111827; }
      .card { border: 1px solid #e5e7eb; border-radius: 12px; padding: 16px; margin: 12px 0; max-width: 960px; }
      .error { color: #b91c1c; }
      .hint { color: #6b7280; font-size: 0.9em; }
      pre { background: #f3f4f6; padding: 12px; border-radius: 8px; overflow-x: auto; }
      table { border-collapse: collapse; }
      td, th { text-align: left; padding: 2px 12px 2px 0; }
      button { padding: 6px 14px; border-radius: 8px; border: 0; background: #111827; color: white; }
"#;

/// Escape text for HTML element and attribute content
pub fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            c => out.push(c),
        }
    }
    out
}

fn layout(body: &str) -> String {
    format!(
        r#"<!doctype html>
<html>
  <head>
    <meta charset="utf-8" />
    <title>epubseal</title>
    <style>{STYLE}</style>
  </head>
  <body>
    <h1>EPUB Content Credentials</h1>
{form}
{body}
  </body>
</html>"#,
        form = FORM
    )
}

const FORM: &str = r#"    <div class="card">
      <form method="post" action="/" enctype="multipart/form-data">
        <input type="file" name="file" accept=".epub,application/epub+zip" required />
        <select name="action">
          <option value="verify">Verify manifest</option>
          <option value="sign">Sign EPUB</option>
          <option value="manifest">Show manifest</option>
          <option value="inspect">Inspect package</option>
        </select>
        <button type="submit">Submit</button>
      </form>
    </div>"#;

/// Upload form, optionally with an error message
pub fn index(error: Option<&str>) -> String {
    let body = match error {
        Some(msg) => format!(r#"    <p class="error">{}</p>"#, escape(msg)),
        None => String::new(),
    };
    layout(&body)
}

/// Form plus the outcome of an action
pub fn result(report: &Report) -> String {
    let mut body = String::new();
    let _ = writeln!(
        body,
        r#"    <div class="card"><h2>{}: {}</h2>"#,
        escape(report.action.as_str()),
        escape(&report.file_name)
    );

    if let Some(err) = &report.error {
        let _ = writeln!(body, r#"    <p class="error">{}</p>"#, escape(err));
    }
    if let Some(validation) = &report.validation {
        body.push_str(&validation_html(validation));
    }
    if let Some(package) = &report.package {
        body.push_str(&package_html(package));
    }
    if let Some(output) = &report.signed_output {
        let _ = writeln!(
            body,
            r#"    <p>Signed file: <a href="/outputs/{id}/{name}">{name}</a></p>"#,
            id = report.id,
            name = escape(output)
        );
    }
    if let Some(manifest) = &report.manifest {
        let pretty = serde_json::to_string_pretty(manifest).unwrap_or_default();
        let _ = writeln!(body, "    <h3>Active manifest</h3>\n    <pre>{}</pre>", escape(&pretty));
    }
    if let Some(payload) = &report.payload {
        let pretty = serde_json::to_string_pretty(payload).unwrap_or_default();
        let _ = writeln!(body, "    <h3>Manifest payload</h3>\n    <pre>{}</pre>", escape(&pretty));
    }

    let _ = writeln!(
        body,
        r#"    <p class="hint">Export: <a href="/report/{id}?format=json">JSON</a> | <a href="/report/{id}?format=text">text</a></p></div>"#,
        id = report.id
    );

    layout(&body)
}

/// Result page for an action name nobody understands
pub fn unknown_action(file_name: &str) -> String {
    layout(&format!(
        r#"    <div class="card"><h2>{}</h2><p class="error">Unknown action</p></div>"#,
        escape(file_name)
    ))
}

fn validation_html(validation: &ValidationSummary) -> String {
    let mut out = String::new();
    for (status, items) in validation.groups() {
        let icon = match status {
            "success" => "✅",
            "informational" => "ℹ️",
            _ => "❌",
        };
        let _ = writeln!(out, "    <h3>{} Status {}:</h3>", icon, status);
        for (i, item) in items.iter().enumerate() {
            let _ = writeln!(
                out,
                "    {}. <b>{}</b>: {}<br>",
                i + 1,
                escape(&item.code),
                escape(item.explanation.as_deref().unwrap_or(""))
            );
        }
    }
    out
}

fn package_html(package: &EpubPackageInfo) -> String {
    let meta = &package.metadata;
    let row = |k: &str, v: &str| format!("      <tr><th>{}</th><td>{}</td></tr>\n", k, escape(v));

    let mut out = String::from("    <h3>Package</h3>\n    <table>\n");
    out.push_str(&row("Title", meta.title.as_deref().unwrap_or("-")));
    out.push_str(&row("Creators", &meta.creators.join(", ")));
    out.push_str(&row("Language", meta.language.as_deref().unwrap_or("-")));
    out.push_str(&row("Identifier", meta.identifier.as_deref().unwrap_or("-")));
    out.push_str(&row("Publisher", meta.publisher.as_deref().unwrap_or("-")));
    out.push_str(&row("Rootfile", package.rootfile.as_deref().unwrap_or("-")));
    out.push_str(&row("Mimetype", package.mimetype.as_deref().unwrap_or("-")));
    out.push_str(&row("Entries", &package.entry_count.to_string()));
    out.push_str(&row(
        "Content credential",
        if package.has_c2pa_manifest { "present" } else { "absent" },
    ));
    out.push_str("    </table>\n");
    for issue in &package.issues {
        let _ = writeln!(out, r#"    <p class="error">{}</p>"#, escape(issue));
    }
    out
}
