//! Cart engine.
//!
//! One line per product id, quantities always >= 1, prices frozen at the
//! moment a line is touched under the active price mode. Derived values
//! (item count, subtotal) are recomputed on every read; the cart never
//! caches totals. The whole POS session (cart, price mode, selected
//! customer, discount) lives in an explicit state struct managed by Tauri,
//! so the engine is unit-testable without any rendering.

use serde::Serialize;
use serde_json::Value;
use std::sync::Mutex;

use crate::models::{CustomerDebt, PriceMode, Product};

// ---------------------------------------------------------------------------
// Cart
// ---------------------------------------------------------------------------

/// A cart line: product snapshot plus quantity and the unit price captured
/// under the active price mode.
#[derive(Debug, Clone, Serialize)]
pub struct CartLine {
    pub product_id: String,
    pub name: String,
    pub image: String,
    pub unit_price: i64,
    pub quantity: i64,
}

#[derive(Debug, Clone)]
pub struct Cart {
    lines: Vec<CartLine>,
    mode: PriceMode,
}

impl Cart {
    pub fn new() -> Self {
        Cart {
            lines: Vec::new(),
            mode: PriceMode::Retail,
        }
    }

    pub fn mode(&self) -> PriceMode {
        self.mode
    }

    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }

    /// Add `delta` to the product's line (creating it if needed), refreshing
    /// the line price to the active mode. A line whose quantity drops to 0
    /// or below is removed, never stored.
    pub fn add_or_increment(&mut self, product: &Product, delta: i64) {
        let price = product.price_for(self.mode);
        if let Some(idx) = self.lines.iter().position(|l| l.product_id == product.id) {
            self.lines[idx].quantity += delta;
            self.lines[idx].unit_price = price;
            if self.lines[idx].quantity <= 0 {
                self.lines.remove(idx);
            }
            return;
        }
        if delta > 0 {
            self.lines.push(CartLine {
                product_id: product.id.clone(),
                name: product.name.clone(),
                image: product.image.clone(),
                unit_price: price,
                quantity: delta,
            });
        }
    }

    /// Set the product's line to exactly `quantity`, refreshing the price to
    /// the active mode. `quantity <= 0` silently removes the line.
    pub fn set_quantity(&mut self, product: &Product, quantity: i64) {
        if quantity <= 0 {
            self.lines.retain(|l| l.product_id != product.id);
            return;
        }
        let price = product.price_for(self.mode);
        if let Some(line) = self.lines.iter_mut().find(|l| l.product_id == product.id) {
            line.quantity = quantity;
            line.unit_price = price;
        } else {
            self.lines.push(CartLine {
                product_id: product.id.clone(),
                name: product.name.clone(),
                image: product.image.clone(),
                unit_price: price,
                quantity,
            });
        }
    }

    /// Drop the product's line if present.
    pub fn remove(&mut self, product_id: &str) {
        self.lines.retain(|l| l.product_id != product_id);
    }

    /// Switch the global pricing mode, re-pricing every line from the given
    /// catalog snapshot. Quantities are untouched; a product that is no
    /// longer in the catalog keeps its current price.
    pub fn set_price_mode(&mut self, mode: PriceMode, catalog: &[Product]) {
        self.mode = mode;
        for line in &mut self.lines {
            if let Some(product) = catalog.iter().find(|p| p.id == line.product_id) {
                line.unit_price = product.price_for(mode);
            }
        }
    }

    pub fn total_items(&self) -> i64 {
        self.lines.iter().map(|l| l.quantity).sum()
    }

    pub fn sub_total(&self) -> i64 {
        self.lines.iter().map(|l| l.unit_price * l.quantity).sum()
    }
}

impl Default for Cart {
    fn default() -> Self {
        Cart::new()
    }
}

/// Lenient quantity parse for the keypad's free-text input: non-numeric
/// input counts as 1, and the result is clamped to at least 1.
pub fn parse_quantity_input(raw: &Value) -> i64 {
    let parsed = match raw {
        Value::Number(n) => n.as_i64().unwrap_or(1),
        Value::String(s) => s.trim().parse::<i64>().unwrap_or(1),
        _ => 1,
    };
    parsed.max(1)
}

// ---------------------------------------------------------------------------
// POS session state
// ---------------------------------------------------------------------------

/// The explicit application state behind the POS screen. No hidden globals:
/// every command reads and mutates this struct through [`PosState`].
#[derive(Debug, Clone, Default)]
pub struct PosSession {
    pub cart: Cart,
    pub selected_customer: Option<CustomerDebt>,
    /// Percent, clamped to [0, 100] at the totals computation.
    pub discount_percent: i64,
    /// Last-fetched catalog snapshot, used to re-price on mode toggles.
    pub catalog: Vec<Product>,
}

/// Tauri managed state wrapping the POS session.
pub struct PosState {
    pub session: Mutex<PosSession>,
}

impl PosState {
    pub fn new() -> Self {
        PosState {
            session: Mutex::new(PosSession::default()),
        }
    }
}

impl Default for PosState {
    fn default() -> Self {
        PosState::new()
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Stock;

    fn product(id: &str, price: i64, wholesale: Option<i64>) -> Product {
        Product {
            id: id.to_string(),
            name: format!("Product {id}"),
            category: "Bánh mì".to_string(),
            price,
            wholesale_price: wholesale,
            stock: Stock::Limited(50),
            image: String::new(),
            base_product_id: None,
        }
    }

    #[test]
    fn one_line_per_product_id() {
        let mut cart = Cart::new();
        let p = product("SP001", 35000, None);
        cart.add_or_increment(&p, 1);
        cart.add_or_increment(&p, 1);
        cart.add_or_increment(&p, 3);
        assert_eq!(cart.lines().len(), 1);
        assert_eq!(cart.total_items(), 5);
        assert_eq!(cart.sub_total(), 175000);
    }

    #[test]
    fn decrement_to_zero_removes_the_line() {
        let mut cart = Cart::new();
        let p = product("SP001", 35000, None);
        cart.add_or_increment(&p, 2);
        cart.add_or_increment(&p, -2);
        assert!(cart.is_empty());

        cart.add_or_increment(&p, 1);
        cart.set_quantity(&p, 0);
        assert!(cart.is_empty());
    }

    #[test]
    fn set_quantity_on_missing_product_inserts() {
        let mut cart = Cart::new();
        let p = product("SP001", 35000, None);
        cart.set_quantity(&p, 4);
        assert_eq!(cart.lines().len(), 1);
        assert_eq!(cart.lines()[0].quantity, 4);
        // Setting to zero on a missing product stays a no-op.
        let other = product("SP002", 1000, None);
        cart.set_quantity(&other, 0);
        assert_eq!(cart.lines().len(), 1);
    }

    #[test]
    fn price_mode_toggle_reprices_without_touching_quantities() {
        let mut cart = Cart::new();
        let catalog = vec![product("SP001", 35000, Some(30000)), product("SP002", 22000, None)];
        cart.add_or_increment(&catalog[0], 2);
        cart.add_or_increment(&catalog[1], 1);

        cart.set_price_mode(PriceMode::Wholesale, &catalog);
        assert_eq!(cart.lines()[0].unit_price, 30000);
        // No wholesale price set: falls back to retail.
        assert_eq!(cart.lines()[1].unit_price, 22000);
        assert_eq!(cart.total_items(), 3);

        // Toggling to the same mode twice is idempotent.
        let before = cart.sub_total();
        cart.set_price_mode(PriceMode::Wholesale, &catalog);
        assert_eq!(cart.sub_total(), before);

        cart.set_price_mode(PriceMode::Retail, &catalog);
        assert_eq!(cart.sub_total(), 2 * 35000 + 22000);
    }

    #[test]
    fn reprice_skips_products_missing_from_catalog() {
        let mut cart = Cart::new();
        let p = product("SP009", 15000, Some(12000));
        cart.add_or_increment(&p, 1);
        // Catalog no longer contains SP009: the line keeps its price.
        cart.set_price_mode(PriceMode::Wholesale, &[]);
        assert_eq!(cart.lines()[0].unit_price, 15000);
        assert_eq!(cart.lines()[0].quantity, 1);
    }

    #[test]
    fn adding_in_wholesale_mode_uses_wholesale_price() {
        let mut cart = Cart::new();
        let catalog = vec![product("SP001", 35000, Some(30000))];
        cart.set_price_mode(PriceMode::Wholesale, &catalog);
        cart.add_or_increment(&catalog[0], 2);
        assert_eq!(cart.sub_total(), 60000);
    }

    #[test]
    fn keypad_input_clamps_to_at_least_one() {
        assert_eq!(parse_quantity_input(&serde_json::json!("12")), 12);
        assert_eq!(parse_quantity_input(&serde_json::json!(" 7 ")), 7);
        assert_eq!(parse_quantity_input(&serde_json::json!("abc")), 1);
        assert_eq!(parse_quantity_input(&serde_json::json!("")), 1);
        assert_eq!(parse_quantity_input(&serde_json::json!(0)), 1);
        assert_eq!(parse_quantity_input(&serde_json::json!(-5)), 1);
        assert_eq!(parse_quantity_input(&serde_json::json!(null)), 1);
    }
}
