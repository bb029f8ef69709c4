//! Reload client injection into HTML responses.

/// Path the sidecar serves the client script on.
pub const CLIENT_SCRIPT_PATH: &str = "/__live_serve/client.js";

/// Path of the WebSocket the client connects back to.
pub const SOCKET_PATH: &str = "/__live_serve/ws";

/// Tag inserted before `</body>`.
pub const SNIPPET: &str = r#"<script src="/__live_serve/client.js" async></script>"#;

/// Browser side of live reload. Reconnects after the sidecar restarts;
/// swaps stylesheets on `css`, reloads the page on `reload`.
pub const CLIENT_SCRIPT: &str = r#"(function () {
  var scheme = location.protocol === "https:" ? "wss://" : "ws://";
  var url = scheme + location.host + "/__live_serve/ws";

  function swapStyles() {
    var links = document.querySelectorAll('link[rel="stylesheet"]');
    for (var i = 0; i < links.length; i++) {
      var href = links[i].href.replace(/([?&])__ls=\d+/, "$1").replace(/[?&]$/, "");
      links[i].href = href + (href.indexOf("?") >= 0 ? "&" : "?") + "__ls=" + Date.now();
    }
  }

  function connect() {
    var socket = new WebSocket(url);
    socket.onmessage = function (event) {
      if (event.data === "css") {
        swapStyles();
      } else if (event.data === "reload") {
        location.reload();
      }
    };
    socket.onclose = function () {
      setTimeout(connect, 1000);
    };
  }

  connect();
})();
"#;

const BODY_CLOSE: &[u8] = b"</body>";

/// Insert [`SNIPPET`] immediately before the first `</body>` (any case).
///
/// Returns `None` when the document has no closing body tag; the caller then
/// passes the original bytes through untouched.
pub fn inject_script(html: &[u8]) -> Option<Vec<u8>> {
    let at = html
        .windows(BODY_CLOSE.len())
        .position(|window| window.eq_ignore_ascii_case(BODY_CLOSE))?;

    let mut out = Vec::with_capacity(html.len() + SNIPPET.len());
    out.extend_from_slice(&html[..at]);
    out.extend_from_slice(SNIPPET.as_bytes());
    out.extend_from_slice(&html[at..]);
    Some(out)
}
