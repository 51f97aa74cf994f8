//! Page rendering
//!
//! Server-side markup for the gallery page plus the small script that sends
//! the picked file to `PUT /api/images/{name}` and redraws from the JSON
//! response. Every dynamic value goes through [`escape_html`].

use crate::session::SessionView;

/// Label on the upload button while idle
pub const UPLOAD_LABEL: &str = "Upload Image";
/// Label on the upload button while an upload runs
pub const UPLOADING_LABEL: &str = "Uploading...";
/// Shown in place of the grid when the bucket is empty
pub const EMPTY_GALLERY_TEXT: &str = "No images found";
/// How often a page rendered mid-upload polls `/api/gallery` for the end of
/// that upload
pub const IN_FLIGHT_POLL_MS: u64 = 1000;

const STYLE: &str = r#"
body { font-family: system-ui, sans-serif; margin: 0 auto; max-width: 1100px; padding: 2rem 1rem; }
h1 { font-size: 1.75rem; }
.controls { display: flex; gap: .75rem; align-items: center; margin-bottom: 1.5rem; }
.controls button { padding: .5rem 1rem; border: 0; border-radius: 6px; background: #2563eb; color: #fff; cursor: pointer; }
.controls button:disabled { background: #94a3b8; cursor: not-allowed; }
.preview img { max-width: 300px; border-radius: 6px; }
.grid { display: grid; grid-template-columns: repeat(auto-fill, minmax(200px, 1fr)); gap: 10px; }
.grid img { width: 100%; max-width: 300px; border-radius: 6px; object-fit: cover; }
.empty { color: #64748b; }
"#;

const SCRIPT: &str = r#"
(function () {
  var root = document.getElementById("gallery-app");
  var input = document.getElementById("file-input");
  var button = document.getElementById("upload-button");
  var token = root.dataset.token || "";

  function headers(extra) {
    var h = extra || {};
    if (token) { h["Authorization"] = "Bearer " + token; }
    return h;
  }

  function setUploading(on) {
    button.disabled = on;
    button.textContent = on ? root.dataset.uploadingLabel : root.dataset.uploadLabel;
  }

  function renderPreview(url) {
    var preview = document.getElementById("preview");
    if (!url) { return; }
    preview.innerHTML = "";
    var h2 = document.createElement("h2");
    h2.textContent = "Uploaded Image:";
    var img = document.createElement("img");
    img.src = url;
    img.alt = "Uploaded";
    preview.appendChild(h2);
    preview.appendChild(img);
  }

  function renderGallery(entries) {
    var gallery = document.getElementById("gallery");
    gallery.innerHTML = "";
    if (!entries.length) {
      var p = document.createElement("p");
      p.className = "empty";
      p.textContent = root.dataset.emptyText;
      gallery.appendChild(p);
      return;
    }
    var grid = document.createElement("div");
    grid.className = "grid";
    entries.forEach(function (entry, index) {
      var img = document.createElement("img");
      img.src = entry.url;
      img.alt = "uploaded-" + index;
      grid.appendChild(img);
    });
    gallery.appendChild(grid);
  }

  // Rendered while another upload was running: wait for the server to go
  // idle, then redraw and hand the button back.
  async function waitForIdle() {
    var pollMs = parseInt(root.dataset.pollMs, 10) || 1000;
    for (;;) {
      await new Promise(function (resolve) { setTimeout(resolve, pollMs); });
      try {
        var res = await fetch("/api/gallery", { headers: headers() });
        if (!res.ok) { continue; }
        var view = await res.json();
        if (view.status !== "in_flight") {
          renderPreview(view.last_uploaded_url);
          renderGallery(view.gallery);
          setUploading(false);
          return;
        }
      } catch (err) {
        console.error("Error fetching image list:", err);
      }
    }
  }

  if (root.dataset.status === "in_flight") { waitForIdle(); }

  button.addEventListener("click", async function () {
    var file = input.files && input.files[0];
    if (!file) { return; }
    setUploading(true);
    try {
      var res = await fetch("/api/images/" + encodeURIComponent(file.name), {
        method: "PUT",
        headers: headers({ "Content-Type": file.type || "application/octet-stream" }),
        body: file
      });
      if (!res.ok) { throw new Error("upload failed with status " + res.status); }
      var body = await res.json();
      renderPreview(body.location);
      renderGallery(body.view.gallery);
    } catch (err) {
      console.error("Error uploading file:", err);
    } finally {
      setUploading(false);
    }
  });
})();
"#;

/// Escape text for use in HTML element content and quoted attributes
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Render the full page for `view`.
///
/// `token` is echoed into the page so the script can authenticate its API
/// calls; it is the caller's own token, never a storage credential.
pub fn render_page(view: &SessionView, token: Option<&str>) -> String {
    let uploading = view.is_uploading();
    let label = if uploading { UPLOADING_LABEL } else { UPLOAD_LABEL };
    let disabled = if uploading { " disabled" } else { "" };

    let mut html = String::with_capacity(4096);
    html.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n");
    html.push_str("<meta charset=\"utf-8\">\n");
    html.push_str("<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n");
    html.push_str("<title>Upload Image to S3</title>\n");
    html.push_str("<style>");
    html.push_str(STYLE);
    html.push_str("</style>\n</head>\n<body>\n");

    html.push_str(&format!(
        "<div id=\"gallery-app\" data-token=\"{}\" data-status=\"{}\" data-poll-ms=\"{}\" data-upload-label=\"{}\" data-uploading-label=\"{}\" data-empty-text=\"{}\">\n",
        escape_html(token.unwrap_or_default()),
        if uploading { "in_flight" } else { "idle" },
        IN_FLIGHT_POLL_MS,
        UPLOAD_LABEL,
        UPLOADING_LABEL,
        EMPTY_GALLERY_TEXT,
    ));
    html.push_str("<h1>Upload Image to S3</h1>\n");
    html.push_str("<div class=\"controls\">\n");
    html.push_str("<input type=\"file\" id=\"file-input\">\n");
    html.push_str(&format!(
        "<button id=\"upload-button\" type=\"button\"{}>{}</button>\n",
        disabled, label
    ));
    html.push_str("</div>\n");

    html.push_str("<div id=\"preview\" class=\"preview\">");
    if let Some(ref url) = view.last_uploaded_url {
        html.push_str(&format!(
            "<h2>Uploaded Image:</h2><img src=\"{}\" alt=\"Uploaded\">",
            escape_html(url)
        ));
    }
    html.push_str("</div>\n");

    html.push_str("<h2>Uploaded Images</h2>\n<div id=\"gallery\">");
    html.push_str(&render_gallery(view));
    html.push_str("</div>\n</div>\n");

    html.push_str("<script>");
    html.push_str(SCRIPT);
    html.push_str("</script>\n</body>\n</html>\n");
    html
}

/// Gallery grid, or the empty fallback
pub fn render_gallery(view: &SessionView) -> String {
    if view.gallery.is_empty() {
        return format!("<p class=\"empty\">{}</p>", EMPTY_GALLERY_TEXT);
    }

    let mut html = String::from("<div class=\"grid\">");
    for (index, entry) in view.gallery.iter().enumerate() {
        html.push_str(&format!(
            "<img src=\"{}\" alt=\"uploaded-{}\" loading=\"lazy\">",
            escape_html(&entry.url),
            index
        ));
    }
    html.push_str("</div>");
    html
}
