//! Initialize a new site

use anyhow::Result;
use std::fs;
use std::path::Path;

use crate::Blog;

const CONFIG_TEMPLATE: &str = r#"# Site
title: spacetraveling
description: ''
language: pt-BR
timezone: ''

# URL
url: http://example.com
root: /

# Directory
public_dir: public
i18n_dir: languages

# Date format (Moment.js style)
date_format: DD MMM YYYY

# Run post bodies through the HTML allow-list
sanitize: true

# Content service
content:
  # Prismic API endpoint, e.g. https://your-repo.cdn.prismic.io/api/v2
  endpoint: ''
  # Also read from the CMS_ACCESS_TOKEN environment variable
  access_token:
  document_type: post
  fetch:
    - post.title
    - post.subtitle
    - post.author
  page_size: 2
  timeout_secs: 10
  # Local records used instead of the endpoint; remove to go live
  fixture: posts.json
  prerender_pages: 1

reading:
  words_per_minute: 200

server:
  on_demand_timeout_secs: 15
  placeholder_refresh_secs: 1
  placeholder_max_attempts: 30
  on_demand_max_entries: 1024
"#;

const SAMPLE_POSTS: &str = r#"[
  {
    "uid": "como-utilizar-hooks",
    "first_publication_date": "2021-03-15T19:25:28+0000",
    "data": {
      "title": "Como utilizar Hooks",
      "subtitle": "Pensando em sincronização em vez de ciclos de vida",
      "author": "Joseph Oliveira",
      "banner": { "url": "https://images.unsplash.com/photo-1555066931-4365d14bab8c" },
      "content": [
        {
          "heading": "Proin et varius",
          "body": [
            { "text": "<p>Lorem ipsum dolor sit amet, consectetur adipiscing elit. Nullam dolor sapien, vulputate eu diam at, condimentum hendrerit tellus.</p>" }
          ]
        },
        {
          "heading": "Cras laoreet mi",
          "body": [
            { "text": "<p>Nulla auctor sit amet quam vitae commodo. Sed risus justo, vulputate quis neque eget, dictum sodales sem.</p>" },
            { "text": "<p>Pellentesque <strong>habitant</strong> morbi tristique senectus et netus.</p>" }
          ]
        }
      ]
    }
  },
  {
    "uid": "criando-um-app-cra-do-zero",
    "first_publication_date": "2021-03-25T19:27:35+0000",
    "data": {
      "title": "Criando um app CRA do zero",
      "subtitle": "Tudo sobre como criar a sua primeira aplicação utilizando Create React App",
      "author": "Danilo Vieira",
      "banner": { "url": "https://images.unsplash.com/photo-1498050108023-c5249f4df085" },
      "content": [
        {
          "heading": "Lorem ipsum",
          "body": [
            { "text": "<p>Suspendisse potenti. Integer <em>vel</em> lorem at nisi luctus viverra.</p>" }
          ]
        }
      ]
    }
  },
  {
    "uid": "ola-mundo",
    "first_publication_date": null,
    "data": {
      "title": "Olá, mundo",
      "subtitle": "O primeiro post",
      "author": "Equipe",
      "banner": { "url": null },
      "content": [
        {
          "heading": "Bem-vindo",
          "body": [
            { "text": "<p>Edite <code>posts.json</code> ou configure <code>content.endpoint</code>.</p>" }
          ]
        }
      ]
    }
  }
]
"#;

/// Initialize a new site in the given directory
pub fn init_site(target_dir: &Path) -> Result<()> {
    fs::create_dir_all(target_dir)?;
    fs::create_dir_all(target_dir.join("languages"))?;

    let config_path = target_dir.join("_config.yml");
    if config_path.exists() {
        anyhow::bail!("{:?} already exists", config_path);
    }
    fs::write(&config_path, CONFIG_TEMPLATE)?;
    fs::write(target_dir.join("posts.json"), SAMPLE_POSTS)?;

    Ok(())
}

/// Run the init command with an existing instance
pub fn run(blog: &Blog) -> Result<()> {
    init_site(&blog.base_dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::RawRecord;

    #[test]
    fn test_init_site() {
        let dir = tempfile::tempdir().unwrap();
        init_site(dir.path()).unwrap();

        let blog = Blog::new(dir.path()).unwrap();
        assert_eq!(blog.config.language, "pt-BR");
        assert_eq!(blog.config.content.fixture.as_deref(), Some("posts.json"));
        assert_eq!(blog.config.content.page_size, 2);

        let records: Vec<RawRecord> = serde_json::from_str(SAMPLE_POSTS).unwrap();
        assert_eq!(records.len(), 3);
        assert!(records[2].first_publication_date.is_none());
    }

    #[test]
    fn test_init_refuses_existing_site() {
        let dir = tempfile::tempdir().unwrap();
        init_site(dir.path()).unwrap();
        assert!(init_site(dir.path()).is_err());
    }
}
