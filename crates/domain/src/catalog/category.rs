use chrono::{DateTime, Utc};
use common::CategoryId;
use serde::{Deserialize, Serialize};

use super::{CatalogError, SLUG_MAX_LEN};

/// A product category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub slug: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A category that has not been persisted yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCategory {
    pub name: String,
    pub slug: String,
    pub is_active: bool,
}

impl NewCategory {
    /// Normalizes the name and slug. The slug falls back to the name.
    pub fn new(name: &str, slug: Option<&str>) -> Result<Self, CatalogError> {
        let name = normalize_name(name)?;
        let slug = normalize_slug(slug, &name)?;
        Ok(Self {
            name,
            slug,
            is_active: true,
        })
    }
}

/// Partial update of a category.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CategoryUpdate {
    pub name: Option<String>,
    pub slug: Option<String>,
    pub is_active: Option<bool>,
}

impl Category {
    /// Applies a partial update, re-normalizing name and slug.
    pub fn apply(&mut self, update: CategoryUpdate) -> Result<(), CatalogError> {
        let name = match update.name {
            Some(name) => normalize_name(&name)?,
            None => self.name.clone(),
        };
        let slug = match update.slug {
            Some(slug) => normalize_slug(Some(&slug), &name)?,
            None => self.slug.clone(),
        };
        self.name = name;
        self.slug = slug;
        if let Some(active) = update.is_active {
            self.is_active = active;
        }
        Ok(())
    }

    /// Soft delete. Returns false if the category was already inactive.
    pub fn deactivate(&mut self) -> bool {
        std::mem::replace(&mut self.is_active, false)
    }
}

fn normalize_name(name: &str) -> Result<String, CatalogError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(CatalogError::EmptyName);
    }
    Ok(name.to_string())
}

fn normalize_slug(slug: Option<&str>, name: &str) -> Result<String, CatalogError> {
    let base = slug.map(str::trim).filter(|s| !s.is_empty()).unwrap_or(name);
    let slug: String = slugify(base).chars().take(SLUG_MAX_LEN).collect();
    if slug.is_empty() {
        return Err(CatalogError::EmptySlug);
    }
    Ok(slug)
}

/// Converts text into a URL slug.
///
/// Lower-cases, drops everything except alphanumerics, `_`, `-` and
/// whitespace, collapses whitespace/hyphen runs into a single `-`, and strips
/// leading and trailing `-`/`_`.
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_dash = false;

    for c in text.to_lowercase().chars() {
        if c.is_whitespace() || c == '-' {
            pending_dash = true;
        } else if c.is_alphanumeric() || c == '_' {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c);
        }
    }

    slug.trim_matches(|c| c == '-' || c == '_').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugify_collapses_separators() {
        assert_eq!(slugify("  Home & Garden  "), "home-garden");
        assert_eq!(slugify("Books -- Used"), "books-used");
        assert_eq!(slugify("_snake_case_"), "snake_case");
        assert_eq!(slugify("!!!"), "");
    }

    #[test]
    fn new_category_derives_slug_from_name() {
        let category = NewCategory::new("  Electronics ", None).unwrap();
        assert_eq!(category.name, "Electronics");
        assert_eq!(category.slug, "electronics");
        assert!(category.is_active);
    }

    #[test]
    fn new_category_rejects_empty_slug() {
        assert_eq!(NewCategory::new("   ", None), Err(CatalogError::EmptyName));
        assert_eq!(NewCategory::new("***", None), Err(CatalogError::EmptySlug));
    }

    #[test]
    fn slug_is_truncated() {
        let long = "a".repeat(150);
        let category = NewCategory::new(&long, None).unwrap();
        assert_eq!(category.slug.len(), SLUG_MAX_LEN);
    }

    #[test]
    fn deactivate_reports_change() {
        let now = Utc::now();
        let mut category = Category {
            id: CategoryId::new(1),
            name: "Books".into(),
            slug: "books".into(),
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        assert!(category.deactivate());
        assert!(!category.deactivate());
        assert!(!category.is_active);
    }
}
