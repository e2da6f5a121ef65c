//! Fixed file bodies published alongside (or instead of) generated content.

pub const WORKFLOW_PATH: &str = ".github/workflows/pages.yml";

/// GitHub Actions workflow that deploys every push to `main` to Pages.
pub const PAGES_WORKFLOW_YML: &str = r#"name: Deploy GitHub Pages
on:
  push:
    branches: [ main ]
permissions:
  contents: read
  pages: write
  id-token: write
concurrency:
  group: "pages"
  cancel-in-progress: false
jobs:
  build:
    runs-on: ubuntu-latest
    steps:
      - uses: actions/checkout@v4
      - run: mkdir -p dist && cp -r * dist/ || true
      - uses: actions/upload-pages-artifact@v3
        with:
          path: ./dist
  deploy:
    needs: build
    runs-on: ubuntu-latest
    environment:
      name: github-pages
      url: ${{ steps.deployment.outputs.page_url }}
    steps:
      - id: deployment
        uses: actions/deploy-pages@v4
"#;

const SEED_MARKER: &str = "__SEED__";

const FALLBACK_INDEX_HTML: &str = r#"<!doctype html>
<html lang="en">
<head>
  <meta charset="utf-8"><meta name="viewport" content="width=device-width,initial-scale=1">
  <title>Assignment App</title>
  <link rel="stylesheet" href="https://cdn.jsdelivr.net/npm/bootstrap@5.3.3/dist/css/bootstrap.min.css">
</head>
<body class="p-4">
<div class="container">
  <h1 class="mb-3">Assignment App</h1>
  <div id="app"></div>
</div>
<script src="./script.js"></script>
</body>
</html>
"#;

const FALLBACK_SCRIPT_JS: &str = r#"(function(){
  const qs = new URLSearchParams(location.search);
  document.title = "GitHub User Created App";
  const seed = "__SEED__";
  const formId = "github-user-" + seed;
  document.getElementById("app").innerHTML = `
    <form id="${formId}" class="row gy-2 gx-3 align-items-center">
      <div class="col-auto"><input class="form-control" id="username" placeholder="octocat" required></div>
      <div class="col-auto"><input class="form-control" id="token" placeholder="?token=... optional"></div>
      <div class="col-auto"><button class="btn btn-primary" type="submit">Lookup</button></div>
    </form>
    <div class="mt-3">
      <div id="github-status" aria-live="polite"></div>
      <div>Created at (UTC): <span id="github-created-at"></span></div>
      <div>Account age: <span id="github-account-age"></span></div>
    </div>
  `;
  const form = document.getElementById(formId);
  const status = document.getElementById("github-status");
  const out = document.getElementById("github-created-at");
  const age = document.getElementById("github-account-age");
  form.addEventListener("submit", async (e) => {
    e.preventDefault();
    const user = document.getElementById("username").value.trim();
    const token = document.getElementById("token").value.trim() || qs.get("token") || "";
    status.textContent = "Starting lookup...";
    try {
      const headers = { "Accept": "application/vnd.github+json" };
      if (token) headers["Authorization"] = `Bearer ${token}`;
      const r = await fetch(`https://api.github.com/users/${user}`, { headers });
      if (!r.ok) throw new Error("HTTP " + r.status);
      const data = await r.json();
      const dt = new Date(data.created_at);
      const y = dt.getUTCFullYear(), m = String(dt.getUTCMonth() + 1).padStart(2, "0"), d = String(dt.getUTCDate()).padStart(2, "0");
      out.textContent = `${y}-${m}-${d}`;
      const now = new Date();
      let years = now.getUTCFullYear() - y;
      if (now.getUTCMonth() < dt.getUTCMonth() || (now.getUTCMonth() === dt.getUTCMonth() && now.getUTCDate() < dt.getUTCDate())) years--;
      age.textContent = years + " years";
      status.textContent = "Success";
      localStorage.setItem("github-user-" + seed, JSON.stringify({ user, token }));
    } catch (err) {
      status.textContent = "Failed: " + err.message;
    }
  });
  const saved = localStorage.getItem("github-user-" + seed);
  if (saved) {
    try {
      const { user, token } = JSON.parse(saved);
      document.getElementById("username").value = user || "";
      document.getElementById("token").value = token || "";
    } catch (_) {}
  }
})();
"#;

pub fn fallback_index_html() -> String {
    FALLBACK_INDEX_HTML.to_string()
}

/// Account-age lookup script. DOM ids embed `seed` so automated checks can find them.
pub fn fallback_script_js(seed: &str) -> String {
    FALLBACK_SCRIPT_JS.replace(SEED_MARKER, seed)
}

pub fn readme(title: &str, summary: &str, pages_url: &str) -> String {
    format!(
        "# {title}\n\n\
         {summary}\n\n\
         ## Setup\n\
         Static site deployed via GitHub Pages (GitHub Actions).\n\n\
         ## Usage\n\
         Open **{pages_url}**.\n\n\
         ## Code\n\
         - Minimal Bootstrap 5 + vanilla JS.\n\
         - See `script.js` for task logic.\n\n\
         ## License\n\
         MIT\n"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workflow_is_valid_yaml_targeting_main() {
        let doc: serde_yaml::Value = serde_yaml::from_str(PAGES_WORKFLOW_YML).unwrap();
        assert_eq!(doc["on"]["push"]["branches"][0].as_str(), Some("main"));
        assert!(doc["jobs"]["build"].is_mapping());
        assert_eq!(doc["jobs"]["deploy"]["needs"].as_str(), Some("build"));
        assert!(PAGES_WORKFLOW_YML.contains("path: ./dist"));
    }

    #[test]
    fn test_fallback_script_embeds_seed() {
        let js = fallback_script_js("ab-cd");
        assert!(js.contains(r#"const seed = "ab-cd";"#));
        assert!(!js.contains(SEED_MARKER));
        for id in ["github-status", "github-created-at", "github-account-age"] {
            assert!(js.contains(&format!("id=\"{}\"", id)), "missing #{}", id);
        }
        assert!(js.contains(r#"aria-live="polite""#));
    }

    #[test]
    fn test_fallback_index_loads_script_and_bootstrap() {
        let html = fallback_index_html();
        assert!(html.contains("<html"));
        assert!(html.contains(r#"<script src="./script.js"></script>"#));
        assert!(html.contains("bootstrap@5"));
    }

    #[test]
    fn test_readme_mentions_pages_url() {
        let md = readme("site1", "a todo app", "https://octo.github.io/site1/");
        assert!(md.starts_with("# site1\n\na todo app\n"));
        assert!(md.contains("Open **https://octo.github.io/site1/**."));
        assert!(md.ends_with("MIT\n"));
    }
}
