//! Path normalization for `src` / `href` attribute values.
//!
//! Build-time configuration decides how relative paths are rewritten:
//! locale prefix, trailing slash policy, asset prefix, and base path. The
//! mount engine calls in here from its attribute path; everything else is
//! configuration data.

/// Build-time path rewriting rules, as emitted by the bundler config.
#[derive(Debug, Clone, Default, serde::Deserialize)]
#[serde(default)]
pub struct PathConfig {
    /// Prepended to any relative path, after the more specific rules.
    pub base_path: Option<String>,

    /// Prepended to relative `src` values (CDN asset host).
    pub asset_prefix: Option<String>,

    /// Whether paths carry a trailing slash.
    pub trailing_slash: Option<bool>,

    /// Active locale, prefixed onto `href` paths that don't carry one.
    pub locale: Option<String>,

    /// Known locales; a path whose first segment is one of these is left
    /// unprefixed.
    pub locales: Vec<String>,
}

impl PathConfig {
    fn is_absolute(value: &str) -> bool {
        value.contains("://") || value.starts_with("//") || value.starts_with("data:")
    }

    /// Rewrite an attribute value per the configured rules. Only `src` and
    /// `href` carrying relative paths are touched.
    pub fn rewrite(&self, attribute: &str, value: &str) -> String {
        if attribute != "src" && attribute != "href" {
            return value.to_string();
        }
        if Self::is_absolute(value) {
            return value.to_string();
        }

        let mut result = value.to_string();

        if attribute == "href" {
            if let Some(locale) = &self.locale {
                let first_segment = result
                    .split(['/', '#', '?'])
                    .nth(1)
                    .unwrap_or_default()
                    .to_string();
                if !self.locales.iter().any(|l| *l == first_segment) {
                    result = format!("/{locale}{result}");
                }
            }

            if let Some(trailing) = self.trailing_slash {
                result = apply_trailing_slash(&result, trailing);
            }
        }

        if attribute == "src" {
            if let Some(prefix) = &self.asset_prefix {
                result = format!("{prefix}{result}");
            }
        }

        if let Some(base) = &self.base_path {
            if !Self::is_absolute(&result) {
                result = format!("{base}{result}");
            }
        }

        result
    }
}

/// Add or strip the slash that sits right before `?`, `#` or the end.
fn apply_trailing_slash(path: &str, wanted: bool) -> String {
    let split_at = path.find(['?', '#']).unwrap_or(path.len());
    let (head, tail) = path.split_at(split_at);

    let head = if wanted {
        if head.ends_with('/') {
            head.to_string()
        } else {
            format!("{head}/")
        }
    } else {
        head.strip_suffix('/').unwrap_or(head).to_string()
    };

    format!("{head}{tail}")
}

// =============================================================================
// Tests
// =============================================================================
