//! Member-name inflection between JSON:API (dasherized) and model (camelCase) forms.

use heck::{ToKebabCase, ToLowerCamelCase};

/// `organization-memberships` / `organization_memberships` -> `organizationMemberships`
pub fn camelize(name: &str) -> String {
    name.to_lower_camel_case()
}

/// `dateCreated` -> `date-created`
pub fn dasherize(name: &str) -> String {
    name.to_kebab_case()
}
