//! Placeholder substitution for custom grant request bodies
//!
//! Custom grant bodies are written as templates so that dynamic values such
//! as the current access token can be embedded in arbitrary fields. Adding a
//! placeholder means adding it to [`TAGS`] and to `resolve`.

/// Values a template may reference.
#[derive(Debug, Clone, Default)]
pub struct TemplateContext {
    /// Current access token
    pub access_token: Option<String>,
    /// Current refresh token
    pub refresh_token: Option<String>,
    /// Current ID token
    pub id_token: Option<String>,
    /// Subject of the current ID token
    pub username: Option<String>,
    /// Space-delimited scope
    pub scope: Option<String>,
    /// Configured client identifier
    pub client_id: Option<String>,
    /// Configured client secret
    pub client_secret: Option<String>,
}

/// Recognised placeholders.
const TAGS: [&str; 7] = [
    "{{token}}",
    "{{refreshToken}}",
    "{{idToken}}",
    "{{username}}",
    "{{scope}}",
    "{{clientID}}",
    "{{clientSecret}}",
];

fn resolve<'a>(tag: &str, context: &'a TemplateContext) -> Option<&'a str> {
    match tag {
        "{{token}}" => context.access_token.as_deref(),
        "{{refreshToken}}" => context.refresh_token.as_deref(),
        "{{idToken}}" => context.id_token.as_deref(),
        "{{username}}" => context.username.as_deref(),
        "{{scope}}" => context.scope.as_deref(),
        "{{clientID}}" => context.client_id.as_deref(),
        "{{clientSecret}}" => context.client_secret.as_deref(),
        _ => None,
    }
}

/// Replaces every recognised placeholder in `template` with its value from
/// `context`.
///
/// A recognised placeholder whose value is absent becomes the empty string.
/// Any other text, including unknown `{{...}}` sequences, is left untouched.
/// The template is scanned once, so substituted values are never expanded.
///
/// # Examples
///
/// ```
/// use oidc_auth::auth::template::{substitute_template_tags, TemplateContext};
///
/// let ctx = TemplateContext {
///     access_token: Some("abc".to_string()),
///     ..Default::default()
/// };
/// assert_eq!(
///     substitute_template_tags("Bearer {{token}} {{other}}", &ctx),
///     "Bearer abc {{other}}"
/// );
/// ```
pub fn substitute_template_tags(template: &str, context: &TemplateContext) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let candidate = &rest[start..];
        match TAGS.iter().find(|tag| candidate.starts_with(*tag)) {
            Some(tag) => {
                out.push_str(resolve(tag, context).unwrap_or_default());
                rest = &candidate[tag.len()..];
            }
            None => {
                out.push('{');
                rest = &candidate[1..];
            }
        }
    }

    out.push_str(rest);
    out
}
