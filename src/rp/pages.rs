//! Minimal hand-rendered pages, enough glue to drive the flows from a
//! browser.

use super::flow::SessionUser;

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

pub fn render_page(title: &str, body: &str) -> String {
    format!(
        r#"<!doctype html>
<html lang="en">
  <head>
    <meta charset="utf-8" />
    <meta name="viewport" content="width=device-width, initial-scale=1" />
    <title>{title}</title>
  </head>
  <body>
    <h1>{title}</h1>
    {body}
  </body>
</html>"#,
        title = title,
        body = body,
    )
}

pub fn home_page(user: Option<&SessionUser>) -> String {
    let body = match user {
        Some(user) => {
            let dump = serde_json::to_string_pretty(user)
                .unwrap_or_else(|_| "(unserializable session)".to_string());
            format!(
                "<p>You are signed in.</p>\n<pre>{}</pre>\n<p><a href=\"/logout\">Sign out</a></p>",
                escape_html(&dump)
            )
        }
        None => concat!(
            "<p>You are not signed in.</p>\n",
            "<p><a href=\"/login\">Sign in (Authorization Code)</a></p>\n",
            "<p><a href=\"/login?show=1\">Show parameters (Authorization Code)</a></p>\n",
            "<p><a href=\"/login/implicit\">Sign in (Implicit)</a></p>\n",
            "<p><a href=\"/login/implicit?show=1\">Show parameters (Implicit)</a></p>\n",
            "<p><a href=\"/login/hybrid\">Sign in (Hybrid)</a></p>\n",
            "<p><a href=\"/login/hybrid?show=1\">Show parameters (Hybrid)</a></p>\n",
            "<p><a href=\"/login/custom\">Custom authorization request</a></p>",
        )
        .to_string(),
    };

    render_page("OIDC RP sample", &body)
}

pub fn login_preview_page(title: &str, params_json: &str, url: &str, use_path: &str) -> String {
    let body = format!(
        "<p>The authorization request will be sent with these parameters.</p>\n\
<pre>{params}</pre>\n\
<p>Authorization URL:</p>\n\
<pre>{url}</pre>\n\
<p><a href=\"{use_path}\">Sign in with this request</a></p>\n\
<p><a href=\"/\">Back to top</a></p>",
        params = escape_html(params_json),
        url = escape_html(url),
        use_path = use_path,
    );
    render_page(title, &body)
}

pub fn custom_form_page() -> String {
    let body = r#"<form method="post" action="/login/custom">
  <p><label>response_type:
    <input name="response_type" value="code" placeholder="code / id_token / code id_token" />
  </label></p>
  <p><label>redirect_uri:
    <select name="redirect_uri">
      <option value="callback">callback (query)</option>
      <option value="fragment">callback/fragment</option>
    </select>
  </label></p>
  <p><label>scope:
    <input name="scope" value="openid profile email" />
  </label></p>
  <p><label>prompt:
    <input name="prompt" placeholder="login / consent / select_account" />
  </label></p>
  <p><label>max_age:
    <input name="max_age" placeholder="300" />
  </label></p>
  <p><label>login_hint:
    <input name="login_hint" placeholder="alice" />
  </label></p>
  <p><label>ui_locales:
    <input name="ui_locales" placeholder="ja en" />
  </label></p>
  <p><label>acr_values:
    <input name="acr_values" placeholder="urn:mace:incommon:iap:silver" />
  </label></p>
  <p><button type="submit">Sign in with this request</button></p>
</form>
<p><a href="/">Back to top</a></p>"#;
    render_page("Custom authorization request", body)
}

pub fn custom_preview_page(params_json: &str, url: &str) -> String {
    let body = format!(
        "<p>The authorization request will be sent with these parameters.</p>\n\
<pre>{params}</pre>\n\
<p>Authorization URL:</p>\n\
<pre>{url}</pre>\n\
<p><a href=\"{url}\">Sign in with this request</a></p>\n\
<p><a href=\"/\">Back to top</a></p>",
        params = escape_html(params_json),
        url = escape_html(url),
    );
    render_page("Custom authorization request", &body)
}

/// Fragments never reach the server; this page re-posts the fragment's
/// parameters so the server side of the flow can consume them.
pub fn fragment_bridge_page(post_url: &str) -> String {
    let body = format!(
        r#"<script>
  (function () {{
    var hash = window.location.hash;
    if (!hash || hash.length < 2) {{
      document.body.innerHTML = '<p>No authorization response found.</p>';
      return;
    }}
    var form = document.createElement('form');
    form.method = 'post';
    form.action = '{post_url}';
    var params = new URLSearchParams(hash.slice(1));
    params.forEach(function (value, key) {{
      var input = document.createElement('input');
      input.type = 'hidden';
      input.name = key;
      input.value = value;
      form.appendChild(input);
    }});
    document.body.appendChild(form);
    form.submit();
  }})();
</script>"#,
        post_url = post_url,
    );
    render_page("Signing in", &body)
}

pub fn logout_done_page() -> String {
    render_page(
        "Signed out",
        "<p><a href=\"/\">Back to top</a></p>",
    )
}

pub fn error_page(message: &str) -> String {
    render_page("Error", &format!("<pre>{}</pre>", escape_html(message)))
}
