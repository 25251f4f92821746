//! Products, strains and the filters used to narrow them down.

use serde::{Deserialize as _, Deserializer};
use serde_derive::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Something sold in the shop.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Product {
    #[serde(rename = "_id", deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(deserialize_with = "null_as_default")]
    pub main_benefit: String,
    #[serde(rename = "type", deserialize_with = "null_as_default")]
    pub kind: String,
    pub other_benefits: Option<String>,
    pub flavor: Option<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub cbd_mg: f64,
    #[serde(deserialize_with = "null_as_default")]
    pub thc: f64,
    pub servings: Option<f64>,
    #[serde(deserialize_with = "null_as_default")]
    pub basic_description: String,
    pub tags: Option<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub sku: String,
}

impl Product {
    pub fn flavors(&self) -> Vec<&str> { split_list(self.flavor.as_deref()) }

    pub fn other_benefits(&self) -> Vec<&str> {
        split_list(self.other_benefits.as_deref())
    }

    pub fn tags(&self) -> Vec<&str> { split_list(self.tags.as_deref()) }
}

/// A cannabis strain.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Strain {
    #[serde(rename = "_id", deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(rename = "type", deserialize_with = "null_as_default")]
    pub kind: String,
    /// A comma-separated list of effects.
    pub benefit: Option<String>,
    /// A comma-separated list of conditions the strain is used for.
    pub common_usage: Option<String>,
    pub flavor: Option<String>,
    pub breeder: Option<String>,
    pub description: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Strain {
    pub fn effects(&self) -> Vec<&str> { split_list(self.benefit.as_deref()) }

    pub fn usages(&self) -> Vec<&str> { split_list(self.common_usage.as_deref()) }

    pub fn flavors(&self) -> Vec<&str> { split_list(self.flavor.as_deref()) }
}

/// Treat an explicit `null` the same as a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + serde::Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn split_list(raw: Option<&str>) -> Vec<&str> {
    raw.map(|raw| {
        raw.split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .collect()
    })
    .unwrap_or_default()
}

fn contains_ignoring_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// What a product should contain.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Content {
    Cbd,
    Thc,
    Mushrooms,
}

impl Content {
    fn matches(self, product: &Product) -> bool {
        match self {
            Content::Cbd => product.cbd_mg > 0.0,
            Content::Thc => product.thc > 0.0,
            Content::Mushrooms => product
                .tags
                .as_deref()
                .map(|tags| contains_ignoring_case(tags, "mushroom"))
                .unwrap_or(false),
        }
    }
}

impl std::str::FromStr for Content {
    type Err = UnknownContent;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cbd" => Ok(Content::Cbd),
            "thc" => Ok(Content::Thc),
            "mushroom" | "mushrooms" => Ok(Content::Mushrooms),
            _ => Err(UnknownContent(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("Unknown content \"{}\", expected one of CBD, THC or Mushrooms", _0)]
pub struct UnknownContent(String);

/// Criteria for narrowing down a list of [`Product`]s. `None` matches
/// anything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProductFilter {
    /// Looked for (case-insensitively) in the product's description.
    pub search: String,
    pub benefit: Option<String>,
    pub kind: Option<String>,
    pub content: Option<Content>,
}

impl ProductFilter {
    pub fn matches(&self, product: &Product) -> bool {
        contains_ignoring_case(&product.basic_description, &self.search)
            && self.benefit.as_ref().map_or(true, |b| *b == product.main_benefit)
            && self.kind.as_ref().map_or(true, |k| *k == product.kind)
            && self.content.map_or(true, |c| c.matches(product))
    }

    pub fn apply<'a>(&self, products: &'a [Product]) -> Vec<&'a Product> {
        products.iter().filter(|p| self.matches(p)).collect()
    }
}

/// Criteria for narrowing down a list of [`Strain`]s. `None` matches
/// anything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StrainFilter {
    /// Looked for (case-insensitively) in the strain's name.
    pub search: String,
    pub kind: Option<String>,
    pub effect: Option<String>,
    pub usage: Option<String>,
}

impl StrainFilter {
    pub fn matches(&self, strain: &Strain) -> bool {
        let mentions = |field: &Option<String>, wanted: &Option<String>| match wanted {
            None => true,
            Some(wanted) => field
                .as_deref()
                .map_or(false, |field| contains_ignoring_case(field, wanted)),
        };

        contains_ignoring_case(&strain.name, &self.search)
            && self.kind.as_ref().map_or(true, |k| *k == strain.kind)
            && mentions(&strain.benefit, &self.effect)
            && mentions(&strain.common_usage, &self.usage)
    }

    pub fn apply<'a>(&self, strains: &'a [Strain]) -> Vec<&'a Strain> {
        strains.iter().filter(|s| self.matches(s)).collect()
    }
}
