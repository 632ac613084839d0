//! The shopper's cart: an ordered list of lines kept in memory, written to
//! local storage after every change and observed by listeners.

use std::sync::Arc;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use crate::{
    error::AppError,
    models::{ItemSnapshot, Product, ProductVariant, VariantSnapshot},
    pricing::{InvalidNumber, Numeric},
    storage::{CART_KEY, KeyValueStore},
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CartError {
    #[error("quantity must be greater than 0")]
    InvalidQuantity,

    #[error("only {available} units of product {product_id} are available")]
    StockExceeded { product_id: String, available: u32 },

    #[error("invalid price for product {product_id}: {source}")]
    InvalidPrice {
        product_id: String,
        #[source]
        source: InvalidNumber,
    },
}

impl From<CartError> for AppError {
    fn from(err: CartError) -> Self {
        AppError::BadRequest(err.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CartLine {
    pub product: Product,
    pub quantity: u32,
    #[serde(default)]
    pub selected_variant: Option<ProductVariant>,
}

impl CartLine {
    pub fn variant_id(&self) -> Option<&str> {
        self.selected_variant.as_ref().map(|variant| variant.id.as_str())
    }

    /// Lines are identified by product id plus variant id, where "no
    /// variant" is its own identity.
    pub fn is(&self, product_id: &str, variant_id: Option<&str>) -> bool {
        self.product.id == product_id && self.variant_id() == variant_id
    }

    /// Variant price when a variant is selected, else the base price.
    pub fn unit_price(&self) -> Result<Decimal, CartError> {
        let price = match &self.selected_variant {
            Some(variant) => &variant.price,
            None => &self.product.price,
        };
        price.amount().map_err(|source| CartError::InvalidPrice {
            product_id: self.product.id.clone(),
            source,
        })
    }

    pub fn subtotal(&self) -> Result<Decimal, CartError> {
        Ok(self.unit_price()? * Decimal::from(self.quantity))
    }

    /// Known stock for the selected variant or product; `None` is unbounded.
    pub fn available_stock(&self) -> Option<u32> {
        let stock = match &self.selected_variant {
            Some(variant) => variant.stock.as_ref(),
            None => self.product.stock.as_ref(),
        };
        stock.and_then(Numeric::as_stock)
    }

    fn check_stock(&self, wanted: u32) -> Result<(), CartError> {
        match self.available_stock() {
            Some(available) if wanted > available => Err(CartError::StockExceeded {
                product_id: self.product.id.clone(),
                available,
            }),
            _ => Ok(()),
        }
    }

    /// Freezes the line with denormalized product data.
    pub fn snapshot(&self) -> Result<ItemSnapshot, CartError> {
        let unit_price = self.unit_price()?;
        Ok(ItemSnapshot {
            product_id: self.product.id.clone(),
            product_name: self.product.name.clone(),
            product_sku: self
                .selected_variant
                .as_ref()
                .and_then(|variant| variant.sku.clone())
                .unwrap_or_else(|| self.product.sku.clone()),
            variant: self.selected_variant.as_ref().map(|variant| VariantSnapshot {
                id: variant.id.clone(),
                name: variant.label().to_string(),
                size: Some(variant.size.clone()).filter(|size| !size.is_empty()),
            }),
            quantity: self.quantity,
            unit_price,
            subtotal: unit_price * Decimal::from(self.quantity),
            image_url: self.product.image_urls.first().cloned(),
        })
    }
}

/// Folds lines sharing a product and variant into one, in first-seen order.
/// A line with no units is rejected.
pub fn merge_lines(lines: &[CartLine]) -> Result<Vec<CartLine>, CartError> {
    let mut merged: Vec<CartLine> = Vec::with_capacity(lines.len());
    for line in lines {
        if line.quantity == 0 {
            return Err(CartError::InvalidQuantity);
        }
        match merged
            .iter_mut()
            .find(|existing| existing.is(&line.product.id, line.variant_id()))
        {
            Some(existing) => existing.quantity = existing.quantity.saturating_add(line.quantity),
            None => merged.push(line.clone()),
        }
    }
    Ok(merged)
}

/// Same folding for snapshots sent by a client. Subtotals are recomputed
/// from the unit price.
pub fn merge_items(items: Vec<ItemSnapshot>) -> Result<Vec<ItemSnapshot>, CartError> {
    let mut merged: Vec<ItemSnapshot> = Vec::with_capacity(items.len());
    for item in items {
        if item.quantity == 0 {
            return Err(CartError::InvalidQuantity);
        }
        let variant_id = item.variant.as_ref().map(|variant| variant.id.as_str());
        let existing = merged.iter_mut().find(|existing| {
            existing.product_id == item.product_id
                && existing.variant.as_ref().map(|variant| variant.id.as_str()) == variant_id
        });
        match existing {
            Some(existing) => existing.quantity = existing.quantity.saturating_add(item.quantity),
            None => merged.push(item),
        }
    }
    for item in &mut merged {
        item.subtotal = item.unit_price * Decimal::from(item.quantity);
    }
    Ok(merged)
}

/// Rebuilds the product and variant a snapshot was taken from. Stock is not
/// part of a snapshot, so restored lines are unbounded.
pub fn restore_line(item: &ItemSnapshot) -> (Product, Option<ProductVariant>) {
    let product = Product {
        id: item.product_id.clone(),
        name: item.product_name.clone(),
        slug: None,
        sku: item.product_sku.clone(),
        description: None,
        price: Numeric::Number(item.unit_price),
        stock: None,
        variants: Vec::new(),
        categories: Vec::new(),
        image_urls: item.image_url.iter().cloned().collect(),
        ecommerce: true,
    };
    let variant = item.variant.as_ref().map(|variant| ProductVariant {
        id: variant.id.clone(),
        size: variant.size.clone().unwrap_or_else(|| variant.name.clone()),
        name: Some(variant.name.clone()),
        price: Numeric::Number(item.unit_price),
        stock: None,
        sku: None,
    });
    (product, variant)
}

#[derive(Debug, Clone, PartialEq)]
pub enum CartEvent {
    ItemAdded { line: CartLine, quantity: u32 },
    ItemRemoved { line: CartLine },
    QuantityChanged { line: CartLine, previous: u32 },
    Cleared,
}

/// Notified after every applied mutation, with the resulting lines.
pub trait CartListener: Send + Sync {
    fn cart_changed(&self, event: &CartEvent, lines: &[CartLine]);
}

pub struct CartStore {
    lines: Vec<CartLine>,
    storage: Arc<dyn KeyValueStore>,
    listeners: Vec<Arc<dyn CartListener>>,
}

impl CartStore {
    /// Loads the persisted lines; an unreadable payload starts an empty cart.
    pub fn load(storage: Arc<dyn KeyValueStore>) -> Self {
        let lines = match storage.get(CART_KEY) {
            Some(raw) => serde_json::from_str::<Vec<CartLine>>(&raw).unwrap_or_else(|err| {
                tracing::warn!(error = %err, "discarding unreadable persisted cart");
                Vec::new()
            }),
            None => Vec::new(),
        };

        Self {
            lines,
            storage,
            listeners: Vec::new(),
        }
    }

    pub fn subscribe(&mut self, listener: Arc<dyn CartListener>) {
        self.listeners.push(listener);
    }

    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn add_item(
        &mut self,
        product: &Product,
        quantity: u32,
        variant: Option<&ProductVariant>,
    ) -> Result<(), CartError> {
        if quantity == 0 {
            return Err(CartError::InvalidQuantity);
        }
        let variant_id = variant.map(|variant| variant.id.as_str());

        let line = match self.position(&product.id, variant_id) {
            Some(index) => {
                // Check against the product as it is now, not as first added.
                let fresh = CartLine {
                    product: product.clone(),
                    quantity: self.lines[index].quantity.saturating_add(quantity),
                    selected_variant: variant.cloned(),
                };
                fresh.check_stock(fresh.quantity)?;
                self.lines[index] = fresh.clone();
                fresh
            }
            None => {
                let line = CartLine {
                    product: product.clone(),
                    quantity,
                    selected_variant: variant.cloned(),
                };
                line.check_stock(quantity)?;
                self.lines.push(line.clone());
                line
            }
        };

        self.commit(CartEvent::ItemAdded { line, quantity });
        Ok(())
    }

    /// Deletes the matching line. Absent lines are not an error.
    pub fn remove_item(&mut self, product_id: &str, variant_id: Option<&str>) {
        if let Some(index) = self.position(product_id, variant_id) {
            let line = self.lines.remove(index);
            self.commit(CartEvent::ItemRemoved { line });
        }
    }

    /// Sets the quantity exactly; zero or less removes the line.
    pub fn update_quantity(
        &mut self,
        product_id: &str,
        quantity: i64,
        variant_id: Option<&str>,
    ) -> Result<(), CartError> {
        if quantity <= 0 {
            self.remove_item(product_id, variant_id);
            return Ok(());
        }
        let quantity = u32::try_from(quantity).unwrap_or(u32::MAX);

        let Some(index) = self.position(product_id, variant_id) else {
            return Ok(());
        };
        let line = &mut self.lines[index];
        if line.quantity == quantity {
            return Ok(());
        }
        line.check_stock(quantity)?;
        let previous = line.quantity;
        line.quantity = quantity;
        let line = line.clone();

        self.commit(CartEvent::QuantityChanged { line, previous });
        Ok(())
    }

    pub fn clear(&mut self) {
        self.lines.clear();
        self.commit(CartEvent::Cleared);
    }

    pub fn total(&self) -> Result<Decimal, CartError> {
        self.lines
            .iter()
            .try_fold(Decimal::ZERO, |total, line| Ok(total + line.subtotal()?))
    }

    /// Sum of quantities, not the number of lines.
    pub fn item_count(&self) -> u32 {
        self.lines.iter().map(|line| line.quantity).sum()
    }

    /// Without a variant id this matches any line of the product.
    pub fn contains(&self, product_id: &str, variant_id: Option<&str>) -> bool {
        self.lines.iter().any(|line| {
            line.product.id == product_id
                && variant_id.is_none_or(|id| line.variant_id() == Some(id))
        })
    }

    pub fn snapshot_items(&self) -> Result<Vec<ItemSnapshot>, CartError> {
        self.lines.iter().map(CartLine::snapshot).collect()
    }

    fn position(&self, product_id: &str, variant_id: Option<&str>) -> Option<usize> {
        self.lines
            .iter()
            .position(|line| line.is(product_id, variant_id))
    }

    fn commit(&self, event: CartEvent) {
        self.persist();
        for listener in &self.listeners {
            listener.cart_changed(&event, &self.lines);
        }
    }

    fn persist(&self) {
        let result = serde_json::to_string(&self.lines)
            .map_err(crate::storage::StorageError::from)
            .and_then(|raw| self.storage.set(CART_KEY, &raw));
        if let Err(err) = result {
            tracing::warn!(error = %err, "could not persist cart");
        }
    }
}
