//! Pre-filled chat messages and the deep links that open them.

use rust_decimal::Decimal;

use crate::{
    models::{AbandonedCart, ItemSnapshot},
    pricing::format_ars,
};

pub fn deep_link(phone: &str, text: &str) -> String {
    format!("https://wa.me/{}?text={}", phone, urlencoding::encode(text))
}

/// Turns a stored 10-digit local mobile number into the `549...` form the
/// chat links expect. Numbers already carrying a country code pass through.
pub fn international_phone(phone: &str) -> String {
    let digits: String = phone.chars().filter(char::is_ascii_digit).collect();
    if digits.len() == 10 {
        format!("549{digits}")
    } else {
        digits
    }
}

/// The checkout summary sent to the shop. Variants are shown by size.
pub fn order_message(order_number: Option<&str>, items: &[ItemSnapshot], total: Decimal) -> String {
    let mut message = String::from("¡Hola! Me interesa realizar el siguiente pedido:\n\n");

    if let Some(number) = order_number {
        message.push_str(&format!("Pedido: {number}\n\n"));
    }

    for (index, item) in items.iter().enumerate() {
        let variant = item
            .variant
            .as_ref()
            .map(|variant| format!(" ({})", variant.size.as_deref().unwrap_or(&variant.name)))
            .unwrap_or_default();
        message.push_str(&format!("{}. {}{}\n", index + 1, item.product_name, variant));
        message.push_str(&format!("   Cantidad: {}\n", item.quantity));
        message.push_str(&format!("   Precio: ${}\n\n", format_ars(item.unit_price)));
    }

    message.push_str(&format!("*Total: ${}*\n\n", format_ars(total)));
    message.push_str("¿Podrían confirmarme disponibilidad y tiempos de entrega?");
    message
}

/// Outreach message for a cart the shopper left behind.
pub fn recovery_message(cart: &AbandonedCart, recovery_link: &str) -> String {
    let items = cart
        .items
        .iter()
        .map(|item| {
            let variant = item
                .variant
                .as_ref()
                .map(|variant| format!(" ({})", variant.name))
                .unwrap_or_default();
            format!("• {}x {}{}", item.quantity, item.product_name, variant)
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "¡Hola! 👋\n\nNotamos que dejaste algunos productos en tu carrito:\n\n{items}\n\n\
         Total: ${}\n\n\
         ¿Querés completar tu compra? Hacé click acá para recuperar tu carrito:\n{recovery_link}\n\n\
         Si tenés alguna duda, estamos para ayudarte! 😊",
        format_ars(cart.total)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::VariantSnapshot;

    fn item(name: &str, variant: Option<&str>, quantity: u32, price: i64) -> ItemSnapshot {
        ItemSnapshot {
            product_id: name.to_lowercase(),
            product_name: name.to_string(),
            product_sku: String::new(),
            variant: variant.map(|size| VariantSnapshot {
                id: format!("{size}-id"),
                name: size.to_string(),
                size: Some(size.to_string()),
            }),
            quantity,
            unit_price: Decimal::from(price),
            subtotal: Decimal::from(price * i64::from(quantity)),
            image_url: None,
        }
    }

    #[test]
    fn order_message_lists_every_line() {
        let items = vec![
            item("Bandera Argentina", None, 2, 1000),
            item("Bandera Argentina", Some("90x150"), 1, 1500),
        ];
        let message = order_message(Some("ECOM-20250101-143052-A7B"), &items, Decimal::from(3500));

        assert_eq!(
            message,
            "¡Hola! Me interesa realizar el siguiente pedido:\n\n\
             Pedido: ECOM-20250101-143052-A7B\n\n\
             1. Bandera Argentina\n   Cantidad: 2\n   Precio: $1.000\n\n\
             2. Bandera Argentina (90x150)\n   Cantidad: 1\n   Precio: $1.500\n\n\
             *Total: $3.500*\n\n\
             ¿Podrían confirmarme disponibilidad y tiempos de entrega?"
        );
    }

    #[test]
    fn local_numbers_get_the_country_prefix() {
        assert_eq!(international_phone("223 541 6600"), "5492235416600");
        assert_eq!(international_phone("5492235416600"), "5492235416600");
    }

    #[test]
    fn deep_link_percent_encodes_the_text() {
        let link = deep_link("5492235416600", "¡Hola!\n*Total: $1.000*");
        assert_eq!(
            link,
            "https://wa.me/5492235416600?text=%C2%A1Hola%21%0A%2ATotal%3A%20%241.000%2A"
        );
    }
}
