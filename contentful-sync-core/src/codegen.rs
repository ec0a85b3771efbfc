//! Accessor rendering for generated content-type models.
//!
//! Link fields become accessors resolving the referenced row by
//! `contentful_id`. Rendering happens ahead of any sync, so an unknown link
//! type is fatal here rather than skipped as it is at materialization time.
//!
//! Rendered methods go into the `impl` block of a model type that derefs to
//! [`crate::contract::EntryRow`], so `self.country`, `self.locale` and
//! [`crate::contract::EntryRow::link_id`] resolve through the row.

use crate::error::CodegenError;
use crate::field::LinkType;

const ENTRY_TEMPLATE: &str = "\
/// {field_camel}: entry linked through `{field}`.
pub async fn {field}<S: ContentStore + ?Sized>(&self, store: &S, table: &str) -> Result<Option<EntryRow>, StoreError> {
    match self.{field}_id() {
        Some(id) => store.find_entry(table, id, &self.country, &self.locale).await,
        None => Ok(None),
    }
}

pub fn {field}_id(&self) -> Option<&str> {
    self.link_id(\"{field_id}\")
}
";

const ASSET_TEMPLATE: &str = "\
/// {field_camel}: asset linked through `{field}`.
pub async fn {field}<S: ContentStore + ?Sized>(&self, store: &S) -> Result<Option<AssetRow>, StoreError> {
    let Some(id) = self.{field}_id() else {
        return Ok(None);
    };
    let rows = store.asset_rows(id).await?;
    Ok(rows
        .into_iter()
        .find(|row| row.country == self.country && row.locale == self.locale))
}

pub fn {field}_id(&self) -> Option<&str> {
    self.link_id(\"{field_id}\")
}
";

/// Renders the accessor for link field `field_id` pointing at `link_type`
/// (the raw `linkType` of the content-type field definition).
pub fn link_accessor(field_id: &str, link_type: &str) -> Result<String, CodegenError> {
    let template = match link_type.parse::<LinkType>() {
        Ok(LinkType::Entry) => ENTRY_TEMPLATE,
        Ok(LinkType::Asset) => ASSET_TEMPLATE,
        Err(_) => return Err(CodegenError::UnknownLinkType(link_type.to_string())),
    };

    let field = snake_case(field_id);
    Ok(template
        .replace("{field_camel}", &studly_case(field_id))
        .replace("{field_id}", field_id)
        .replace("{field}", &field))
}

/// `heroImage` -> `HeroImage`, `hero_image` -> `HeroImage`.
pub fn studly_case(id: &str) -> String {
    id.split(|c: char| c == '_' || c == '-' || c == ' ')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect()
}

/// `heroImage` -> `hero_image`.
pub fn snake_case(id: &str) -> String {
    let mut out = String::with_capacity(id.len() + 4);
    for (i, c) in id.chars().enumerate() {
        if c.is_uppercase() {
            if i > 0 && !out.ends_with('_') {
                out.push('_');
            }
            out.extend(c.to_lowercase());
        } else if c == '-' || c == ' ' {
            out.push('_');
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_entry_and_asset_accessors() {
        let entry = link_accessor("relatedArticle", "Entry").unwrap();
        assert!(entry.contains("pub async fn related_article<"));
        assert!(entry.contains("self.link_id(\"relatedArticle\")"));
        assert!(entry.contains("store.find_entry"));

        let asset = link_accessor("heroImage", "Asset").unwrap();
        assert!(asset.contains("pub async fn hero_image<"));
        assert!(asset.contains("store.asset_rows"));
    }

    #[test]
    fn unknown_link_type_is_fatal() {
        assert_eq!(
            link_accessor("author", "Space"),
            Err(CodegenError::UnknownLinkType("Space".into()))
        );
    }

    #[test]
    fn case_conversions() {
        assert_eq!(studly_case("hero_image"), "HeroImage");
        assert_eq!(studly_case("heroImage"), "HeroImage");
        assert_eq!(snake_case("heroImage"), "hero_image");
        assert_eq!(snake_case("slug"), "slug");
    }
}
