//! Request line items and the tagged payloads built from them.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};

use crate::errors::{ClientError, ClientResult};

/// The three resource families a request can ask for.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumIter,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ItemKind {
    Chemical,
    Glassware,
    Equipment,
}

impl ItemKind {
    /// Name of the JSON array holding items of this kind.
    pub fn collection(&self) -> &'static str {
        match self {
            ItemKind::Chemical => "chemicals",
            ItemKind::Glassware => "glassware",
            ItemKind::Equipment => "equipment",
        }
    }
}

/// A chemical, glassware or equipment line on an experiment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestItem {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    pub name: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub quantity: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(default, with = "rust_decimal::serde::float")]
    pub allocated_quantity: Decimal,
    #[serde(default)]
    pub is_allocated: bool,
    #[serde(default)]
    pub is_disabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disabled_reason: Option<String>,
    #[serde(
        default,
        with = "rust_decimal::serde::float_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub original_quantity: Option<Decimal>,
}

impl RequestItem {
    /// Quantity still to be handed out. Disabled items have nothing remaining.
    pub fn remaining(&self) -> ClientResult<Decimal> {
        if self.allocated_quantity > self.quantity {
            return Err(ClientError::Validation(format!(
                "{}: allocated quantity {} exceeds requested quantity {}",
                self.name, self.allocated_quantity, self.quantity
            )));
        }
        if self.is_disabled {
            return Ok(Decimal::ZERO);
        }
        Ok(self.quantity - self.allocated_quantity)
    }

    /// True when an admin changed the quantity after the faculty submitted it.
    pub fn was_edited(&self) -> bool {
        self.original_quantity
            .map(|original| original != self.quantity)
            .unwrap_or(false)
    }
}

/// One item line in an allocate or return payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemLine {
    pub experiment_id: String,
    pub item_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub quantity: Decimal,
}

/// Allocate / return body, grouped by item kind.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UnifiedItems {
    #[serde(default)]
    pub chemicals: Vec<ItemLine>,
    #[serde(default)]
    pub glassware: Vec<ItemLine>,
    #[serde(default)]
    pub equipment: Vec<ItemLine>,
}

impl UnifiedItems {
    pub fn push(&mut self, kind: ItemKind, line: ItemLine) {
        self.lines_mut(kind).push(line);
    }

    pub fn lines(&self, kind: ItemKind) -> &[ItemLine] {
        match kind {
            ItemKind::Chemical => &self.chemicals,
            ItemKind::Glassware => &self.glassware,
            ItemKind::Equipment => &self.equipment,
        }
    }

    fn lines_mut(&mut self, kind: ItemKind) -> &mut Vec<ItemLine> {
        match kind {
            ItemKind::Chemical => &mut self.chemicals,
            ItemKind::Glassware => &mut self.glassware,
            ItemKind::Equipment => &mut self.equipment,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (ItemKind, &ItemLine)> {
        self.chemicals
            .iter()
            .map(|line| (ItemKind::Chemical, line))
            .chain(self.glassware.iter().map(|line| (ItemKind::Glassware, line)))
            .chain(self.equipment.iter().map(|line| (ItemKind::Equipment, line)))
    }

    pub fn len(&self) -> usize {
        self.chemicals.len() + self.glassware.len() + self.equipment.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Toggle for a single item's disabled flag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisableUpdate {
    pub experiment_id: String,
    pub item_id: String,
    pub item_type: ItemKind,
    pub is_disabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn item(quantity: Decimal, allocated: Decimal) -> RequestItem {
        RequestItem {
            id: "c1".into(),
            name: "Ethanol".into(),
            quantity,
            unit: Some("ml".into()),
            allocated_quantity: allocated,
            is_allocated: false,
            is_disabled: false,
            disabled_reason: None,
            original_quantity: None,
        }
    }

    #[test]
    fn remaining_subtracts_allocated() {
        assert_eq!(item(dec!(10.5), dec!(4)).remaining().unwrap(), dec!(6.5));
    }

    #[test]
    fn disabled_item_has_nothing_remaining() {
        let mut disabled = item(dec!(10), dec!(2));
        disabled.is_disabled = true;
        assert_eq!(disabled.remaining().unwrap(), Decimal::ZERO);
    }

    #[test]
    fn over_allocation_is_rejected() {
        assert!(matches!(
            item(dec!(1), dec!(2)).remaining(),
            Err(ClientError::Validation(_))
        ));
    }

    #[test]
    fn deserializes_mongo_style_item() {
        let raw = r#"{"_id":"g7","name":"Beaker 250ml","quantity":4,"allocatedQuantity":1,
            "isDisabled":true,"disabledReason":"broken","originalQuantity":6}"#;
        let parsed: RequestItem = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.id, "g7");
        assert_eq!(parsed.allocated_quantity, dec!(1));
        assert!(parsed.is_disabled);
        assert!(parsed.was_edited());
    }

    #[test]
    fn unified_items_serialize_by_collection() {
        let mut items = UnifiedItems::default();
        items.push(
            ItemKind::Glassware,
            ItemLine {
                experiment_id: "e1".into(),
                item_id: "g1".into(),
                name: "Pipette".into(),
                quantity: dec!(2),
            },
        );
        let value = serde_json::to_value(&items).unwrap();
        assert_eq!(value["glassware"][0]["itemId"], "g1");
        assert_eq!(value["glassware"][0]["quantity"], 2.0);
        assert!(value["chemicals"].as_array().unwrap().is_empty());
        assert_eq!(items.len(), 1);
    }

    #[test]
    fn kind_round_trips_through_strum() {
        assert_eq!(ItemKind::Chemical.to_string(), "chemical");
        assert_eq!("equipment".parse::<ItemKind>().unwrap(), ItemKind::Equipment);
        assert_eq!(ItemKind::Glassware.collection(), "glassware");
    }
}
