use std::path::PathBuf;

use sitepack_lib::build::run_build;
use sitepack_lib::config::{BuildMode, DocumentDecl, ProjectFile};

use super::common::Site;

const NESTED_HTML: &str = r#"<html>
<head>
  <meta charset="utf-8">
  <link rel="stylesheet" href="../dist/styles.css">
  <link rel="stylesheet" href="https://cdn.example/normalize.css">
</head>
<body>
  <script src="../dist/bundle.0123456789.js?v=3"></script>
  <script src="../vendor/bundle.min.js"></script>
</body>
</html>
"#;

#[tokio::test]
async fn nested_documents_get_relative_prefixes() {
  let site = Site::standard();
  site.write("blog/post.html", NESTED_HTML);
  site.write("embed/widget.html", "<head><script src=\"/assets/bundle.js\"></script></head>");

  let config = site.config_with(ProjectFile {
    documents: Some(vec![
      DocumentDecl::Path(PathBuf::from("index.html")),
      DocumentDecl::Path(PathBuf::from("blog/post.html")),
      DocumentDecl::Detailed {
        path: PathBuf::from("embed/widget.html"),
        prefix: Some("/assets/".into()),
      },
    ]),
    ..Default::default()
  });

  let report = run_build(&config, BuildMode::Development).await.unwrap();
  let manifest = site.manifest().unwrap();
  let script = &manifest.assets.script.as_ref().unwrap().filename;
  let style = &manifest.assets.style.as_ref().unwrap().filename;

  assert_eq!(report.sync.updated.len(), 3);

  let post = site.read("blog/post.html");
  assert!(post.contains(&format!("href=\"../dist/{}\"", style)));
  assert!(post.contains(&format!("src=\"../dist/{}\"", script)));
  assert!(post.contains("https://cdn.example/normalize.css"));
  assert!(post.contains("../vendor/bundle.min.js"));
  assert!(post.contains("<meta charset=\"utf-8\">\n  <meta name=\"build-version\""));

  let widget = site.read("embed/widget.html");
  assert!(widget.contains(&format!("src=\"/assets/{}\"", script)));

  // The 404 page is not registered in this project and must stay untouched.
  assert_eq!(site.read("404.html"), super::common::NOT_FOUND_HTML);
}
