use crate::infra::storage::file::load_yaml_from_file;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// タグの種別
///
/// Defaultはシステム予約タグで、保存済みエンドポイント経由でのみ同期できる。
/// スラッグからのパス合成は行われない。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TagKind {
    Default,
    Custom,
}

/// トピックベースの同期ソースを表すタグ
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tag {
    pub slug: String,
    pub kind: TagKind,
    /// タグ自身が持つエンドポイント（保存済みエンドポイントより優先される）
    pub endpoint: Option<String>,
}

impl Tag {
    /// ユーザー定義のカスタムタグを作成
    pub fn custom(slug: &str) -> Self {
        Self {
            slug: slug.to_string(),
            kind: TagKind::Custom,
            endpoint: None,
        }
    }

    /// エンドポイント付きのシステムタグを作成
    pub fn default_with_endpoint(slug: &str, endpoint: &str) -> Self {
        Self {
            slug: slug.to_string(),
            kind: TagKind::Default,
            endpoint: Some(endpoint.to_string()),
        }
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:?})", self.slug, self.kind)
    }
}

/// スラッグをパス合成に使える形へ正規化する
///
/// 前後の空白を除去し、空白はダッシュへ置換、ASCII英数字と`-`/`_`以外は
/// 取り除いた上で小文字化する。
pub fn sanitize_with_dashes(slug: &str) -> String {
    slug.trim()
        .chars()
        .map(|c| if c.is_whitespace() { '-' } else { c })
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .collect::<String>()
        .to_lowercase()
}

/// タグ検索のフィルター条件を表す構造体
#[derive(Debug, Default)]
pub struct TagQuery {
    pub kind: Option<TagKind>,
    pub slug: Option<String>,
}

impl TagQuery {
    pub fn from_kind(kind: TagKind) -> Self {
        Self {
            kind: Some(kind),
            slug: None,
        }
    }
}

// YAMLファイルの構造に対応する型（種別 -> スラッグ -> エンドポイント）
type TagMap = HashMap<String, HashMap<String, Option<String>>>;

/// src/domain/data/tags.yamlから購読タグを読み込み、Tagのベクタとして返す
fn load_tags_from_yaml(file_path: &str) -> Result<Vec<Tag>> {
    let tag_map: TagMap = load_yaml_from_file(file_path)
        .with_context(|| format!("タグYAMLファイルの読み込みに失敗: {}", file_path))?;

    let mut tags = Vec::new();

    for (kind_key, slugs) in tag_map {
        let kind = match kind_key.as_str() {
            "default" => TagKind::Default,
            _ => TagKind::Custom,
        };
        for (slug, endpoint) in slugs {
            tags.push(Tag {
                slug,
                kind,
                endpoint,
            });
        }
    }

    Ok(tags)
}

/// 購読タグを絞り込み検索する
/// 1. 絞り込みなし（全件）
/// 2. kindのみ指定
/// 3. kind & slug指定
///
/// 内部でtags.yamlファイルを読み込み、指定されたクエリでフィルタリングする
pub fn search_tags(query: Option<TagQuery>) -> Result<Vec<Tag>> {
    let tags = load_tags_from_yaml("src/domain/data/tags.yaml")?;
    let query = query.unwrap_or_default();

    let filtered_tags = tags
        .iter()
        .filter(|tag| {
            if let Some(kind_filter) = query.kind {
                if tag.kind != kind_filter {
                    return false;
                }
            }

            if let Some(ref slug_filter) = query.slug {
                if tag.slug != *slug_filter {
                    return false;
                }
            }

            true
        })
        .cloned()
        .collect();

    Ok(filtered_tags)
}
