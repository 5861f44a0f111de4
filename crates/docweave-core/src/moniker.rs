//! Moniker registry and range evaluation.
//!
//! A moniker names one version of one product. Monikers of the same product are
//! totally ordered, which gives the `<`, `<=`, `>` and `>=` comparators of a
//! [`RangeExpr`] their meaning.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::range::{LogicOp, Operator, RangeExpr, RangeVisitor};

/// Moniker errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MonikerError {
    /// The range string does not match the grammar.
    #[error("invalid moniker range '{range}': {message} at '{remainder}'")]
    Parse {
        range: String,
        remainder: String,
        message: String,
    },

    /// A range references a moniker that was never registered.
    #[error("unknown moniker '{0}'")]
    UnknownMoniker(String),

    /// Two definitions share a moniker name.
    #[error(
        "duplicate moniker '{name}' in product '{product}', already defined by product '{existing_product}'"
    )]
    Duplicate {
        name: String,
        product: String,
        existing_product: String,
    },
}

/// One `(moniker, product, order)` triple from configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonikerDefinition {
    /// Process-wide unique moniker name.
    pub name: String,

    /// Product the moniker belongs to.
    pub product: String,

    /// Position within the product.
    #[serde(default)]
    pub order: i64,
}

impl MonikerDefinition {
    pub fn new(name: impl Into<String>, product: impl Into<String>, order: i64) -> Self {
        Self {
            name: name.into(),
            product: product.into(),
            order,
        }
    }
}

#[derive(Debug, Clone)]
struct MonikerSlot {
    product: String,
    index: usize,
}

/// Immutable lookup table from moniker name to its position in its product.
#[derive(Debug, Clone, Default)]
pub struct MonikerRegistry {
    slots: HashMap<String, MonikerSlot>,
    products: HashMap<String, Vec<String>>,
}

impl MonikerRegistry {
    /// Build the registry, collecting configuration errors instead of failing.
    ///
    /// Duplicate names are resolved first-wins in input order; the later
    /// definition is reported and left out of its product's ordering.
    pub fn build(definitions: &[MonikerDefinition]) -> (Self, Vec<MonikerError>) {
        let mut errors = Vec::new();
        let mut owners: HashMap<&str, &str> = HashMap::new();
        let mut grouped: HashMap<String, Vec<&MonikerDefinition>> = HashMap::new();

        for definition in definitions {
            if let Some(existing_product) = owners.get(definition.name.as_str()) {
                errors.push(MonikerError::Duplicate {
                    name: definition.name.clone(),
                    product: definition.product.clone(),
                    existing_product: (*existing_product).to_string(),
                });
                continue;
            }
            owners.insert(&definition.name, &definition.product);
            grouped
                .entry(definition.product.clone())
                .or_default()
                .push(definition);
        }

        let mut registry = Self::default();
        for (product, mut members) in grouped {
            members.sort_by_key(|m| m.order);
            let names: Vec<String> = members.iter().map(|m| m.name.clone()).collect();
            for (index, name) in names.iter().enumerate() {
                registry.slots.insert(
                    name.clone(),
                    MonikerSlot {
                        product: product.clone(),
                        index,
                    },
                );
            }
            registry.products.insert(product, names);
        }

        debug!(
            monikers = registry.slots.len(),
            products = registry.products.len(),
            errors = errors.len(),
            "moniker registry built"
        );

        (registry, errors)
    }

    /// Whether no monikers are registered.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Whether a moniker name is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.slots.contains_key(name)
    }

    /// Product a moniker belongs to.
    pub fn product_of(&self, name: &str) -> Option<&str> {
        self.slots.get(name).map(|slot| slot.product.as_str())
    }

    /// Ordered moniker names of one product.
    pub fn product_monikers(&self, product: &str) -> Option<&[String]> {
        self.products.get(product).map(Vec::as_slice)
    }

    /// Every registered moniker name.
    pub fn all_monikers(&self) -> BTreeSet<String> {
        self.slots.keys().cloned().collect()
    }

    /// Parse and evaluate a range string.
    pub fn evaluate(&self, range: &str) -> Result<BTreeSet<String>, MonikerError> {
        let expr = RangeExpr::parse(range)?;
        self.evaluate_expr(&expr)
    }

    /// Evaluate an already parsed range.
    pub fn evaluate_expr(&self, expr: &RangeExpr) -> Result<BTreeSet<String>, MonikerError> {
        expr.accept(&mut RangeEvaluator { registry: self })
    }
}

struct RangeEvaluator<'a> {
    registry: &'a MonikerRegistry,
}

impl RangeVisitor for RangeEvaluator<'_> {
    type Output = Result<BTreeSet<String>, MonikerError>;

    fn visit_comparator(&mut self, op: Operator, moniker: &str) -> Self::Output {
        let slot = self
            .registry
            .slots
            .get(moniker)
            .ok_or_else(|| MonikerError::UnknownMoniker(moniker.to_string()))?;
        let ordered = self
            .registry
            .products
            .get(&slot.product)
            .ok_or_else(|| MonikerError::UnknownMoniker(moniker.to_string()))?;

        let selected = match op {
            Operator::Eq => &ordered[slot.index..=slot.index],
            Operator::Gt => &ordered[slot.index + 1..],
            Operator::Ge => &ordered[slot.index..],
            Operator::Lt => &ordered[..slot.index],
            Operator::Le => &ordered[..=slot.index],
        };

        Ok(selected.iter().cloned().collect())
    }

    fn visit_logic(&mut self, left: &RangeExpr, op: LogicOp, right: &RangeExpr) -> Self::Output {
        let left = left.accept(self)?;
        let right = right.accept(self)?;

        Ok(match op {
            LogicOp::And => left.intersection(&right).cloned().collect(),
            LogicOp::Or => left.union(&right).cloned().collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    fn two_products() -> MonikerRegistry {
        // Deliberately out of order to exercise the sort.
        let (registry, errors) = MonikerRegistry::build(&[
            MonikerDefinition::new("c", "P1", 3),
            MonikerDefinition::new("a", "P1", 1),
            MonikerDefinition::new("y", "P2", 2),
            MonikerDefinition::new("b", "P1", 2),
            MonikerDefinition::new("x", "P2", 1),
        ]);
        assert!(errors.is_empty());
        registry
    }

    #[test]
    fn test_and_or_across_products() {
        let registry = two_products();
        assert_eq!(registry.evaluate(">=b || >x").unwrap(), set(&["b", "c", "y"]));
    }

    #[test]
    fn test_comparator_boundaries() {
        let registry = two_products();
        assert_eq!(registry.evaluate("<b").unwrap(), set(&["a"]));
        assert_eq!(registry.evaluate("<=b").unwrap(), set(&["a", "b"]));
        assert_eq!(registry.evaluate(">b").unwrap(), set(&["c"]));
        assert_eq!(registry.evaluate(">=b").unwrap(), set(&["b", "c"]));
        assert_eq!(registry.evaluate("=b").unwrap(), set(&["b"]));
        assert_eq!(registry.evaluate("b").unwrap(), set(&["b"]));
    }

    #[test]
    fn test_implicit_and_is_intersection() {
        let registry = two_products();
        assert_eq!(registry.evaluate(">a <c").unwrap(), set(&["b"]));
        assert!(registry.evaluate(">c <a").unwrap().is_empty());
    }

    #[test]
    fn test_unknown_moniker_is_error() {
        let registry = two_products();
        assert_eq!(
            registry.evaluate(">=b || >zz"),
            Err(MonikerError::UnknownMoniker("zz".to_string()))
        );
    }

    #[test]
    fn test_duplicate_name_first_wins() {
        let (registry, errors) = MonikerRegistry::build(&[
            MonikerDefinition::new("v1", "P1", 0),
            MonikerDefinition::new("v1", "P2", 0),
        ]);

        assert_eq!(errors.len(), 1);
        assert!(matches!(&errors[0], MonikerError::Duplicate { product, .. } if product == "P2"));
        assert_eq!(registry.product_of("v1"), Some("P1"));
        assert!(registry.product_monikers("P2").is_none());
        assert_eq!(registry.evaluate(">=v1").unwrap(), set(&["v1"]));
    }

    #[test]
    fn test_equal_order_is_stable() {
        let (registry, _) = MonikerRegistry::build(&[
            MonikerDefinition::new("first", "P", 1),
            MonikerDefinition::new("second", "P", 1),
            MonikerDefinition::new("zero", "P", 0),
        ]);
        assert_eq!(
            registry.product_monikers("P").unwrap(),
            &["zero".to_string(), "first".to_string(), "second".to_string()]
        );
    }

    #[test]
    fn test_all_monikers() {
        let registry = two_products();
        assert_eq!(registry.all_monikers(), set(&["a", "b", "c", "x", "y"]));
        assert!(registry.contains("y"));
        assert!(!MonikerRegistry::default().contains("y"));
        assert!(MonikerRegistry::default().is_empty());
    }
}
