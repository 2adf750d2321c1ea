//! Printable invoice representation.
//!
//! Built from an order at settlement time for display/printing only; never
//! stored. The HTML targets the webview's print dialog (80mm receipt
//! layout); the QR section points at the VietQR image service with the
//! store's bank details, the amount due, and the order reference.

use reqwest::Url;
use serde_json::Value;

use crate::checkout::Totals;
use crate::models::{Order, OrderLine};

// Store header, as printed on every invoice.
pub const SHOP_NAME: &str = "BINH MINH BAKERY";
pub const SHOP_ADDRESS: &str = "608 Phan Chu Trinh, P. Hương Trà, Đà Nẵng";
pub const SHOP_PHONE: &str = "02353851573 - 0905422504";

// Payment QR details (NH Đầu tư & Phát triển).
pub const BANK_ID: &str = "BIDV";
pub const BANK_ACCOUNT_NO: &str = "56210000599780";
pub const BANK_ACCOUNT_NAME: &str = "LUONG THI THANH TAN";
const QR_TEMPLATE: &str = "compact";

/// Order-id prefix length carried into the QR transfer note.
const QR_REF_LEN: usize = 15;

// ---------------------------------------------------------------------------
// Formatting
// ---------------------------------------------------------------------------

/// Vietnamese thousands grouping: 1234567 -> "1.234.567".
pub fn format_vnd(amount: i64) -> String {
    let negative = amount < 0;
    let digits = amount.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(c);
    }
    if negative {
        format!("-{grouped}")
    } else {
        grouped
    }
}

/// VietQR image URL for the given amount and transfer note.
pub fn vietqr_url(amount: i64, add_info: &str) -> String {
    let base = format!("https://img.vietqr.io/image/{BANK_ID}-{BANK_ACCOUNT_NO}-{QR_TEMPLATE}.png");
    let mut url = Url::parse(&base).expect("static QR base URL is valid");
    url.query_pairs_mut()
        .append_pair("amount", &amount.to_string())
        .append_pair("addInfo", add_info)
        .append_pair("accountName", BANK_ACCOUNT_NAME);
    url.to_string()
}

// ---------------------------------------------------------------------------
// Assembly
// ---------------------------------------------------------------------------

/// Assemble the invoice for a settled order.
pub fn build(
    order: &Order,
    lines: &[OrderLine],
    customer_name: Option<&str>,
    totals: &Totals,
) -> Value {
    let short_id = order.id.get(..8).unwrap_or(&order.id);
    let qr_ref = order.id.get(..QR_REF_LEN).unwrap_or(&order.id);
    let qr_url = vietqr_url(order.total_amount, qr_ref);
    let date = order.created_at.format("%d/%m/%Y %H:%M").to_string();

    let customer_html = match customer_name {
        Some(name) => format!(
            "<div style=\"display:flex;justify-content:space-between;\"><span>Khách:</span><strong>{name}</strong></div>\n"
        ),
        None => String::new(),
    };

    let mut items_html = String::new();
    for line in lines {
        items_html.push_str(&format!(
            "<tr><td style=\"padding:2px 4px 2px 0;\">{}</td><td style=\"text-align:center;white-space:nowrap;\">x{}</td><td style=\"text-align:right;white-space:nowrap;\">{}</td></tr>\n",
            line.product_name,
            line.quantity,
            format_vnd(line.price * line.quantity),
        ));
    }

    // Subtotal and discount rows only matter when a discount applied.
    let mut totals_html = String::new();
    if totals.discount_amount > 0 {
        totals_html.push_str(&format!(
            "<div style=\"display:flex;justify-content:space-between;\"><span>Tạm tính:</span><span>{}đ</span></div>\n",
            format_vnd(totals.sub_total)
        ));
        totals_html.push_str(&format!(
            "<div style=\"display:flex;justify-content:space-between;\"><span>Chiết khấu ({}%):</span><span>-{}đ</span></div>\n",
            totals.discount_percent,
            format_vnd(totals.discount_amount)
        ));
    }
    totals_html.push_str(&format!(
        "<div style=\"display:flex;justify-content:space-between;font-size:14px;\"><strong>TỔNG CỘNG:</strong><strong>{}đ</strong></div>\n<div style=\"text-align:right;font-style:italic;\">({})</div>",
        format_vnd(totals.total),
        order.payment_method.label_vi(),
    ));

    let html = format!(
        r#"<div style="font-family:monospace;font-size:11px;line-height:1.4;width:100%;color:#000;">
<div style="text-align:center;margin-bottom:8px;border-bottom:1px dashed #000;padding-bottom:6px;">
<strong style="font-size:15px;">{SHOP_NAME}</strong><br/>
{SHOP_ADDRESS}<br/>
Hotline: {SHOP_PHONE}</div>
<div style="margin:4px 0;">
<div style="display:flex;justify-content:space-between;"><span>HĐ:</span><span>#{short_id}</span></div>
<div style="display:flex;justify-content:space-between;"><span>Ngày:</span><span>{date}</span></div>
{customer_html}</div>
<hr style="border:none;border-top:1px dashed #000;"/>
<table style="width:100%;font-family:monospace;font-size:11px;">
<tr style="text-align:left;"><th>Món</th><th style="text-align:center;">SL</th><th style="text-align:right;">Thành tiền</th></tr>
{items_html}</table>
<hr style="border:none;border-top:1px dashed #000;"/>
{totals_html}
<div style="text-align:center;margin-top:10px;">
<div style="font-size:9px;text-transform:uppercase;"><strong>Quét mã để thanh toán</strong></div>
<img src="{qr_url}" alt="VietQR" style="width:128px;height:128px;object-fit:contain;"/>
<div style="font-size:9px;">{BANK_ID} - {BANK_ACCOUNT_NO}</div>
<div style="font-size:9px;"><strong>{BANK_ACCOUNT_NAME}</strong></div>
</div>
<div style="text-align:center;margin-top:8px;">
Cảm ơn quý khách!<br/>
Hẹn gặp lại</div>
</div>"#,
    );

    serde_json::json!({
        "html": html,
        "qrUrl": qr_url,
        "orderId": order.id,
        "shop": {
            "name": SHOP_NAME,
            "address": SHOP_ADDRESS,
            "phone": SHOP_PHONE,
        },
    })
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkout::compute_totals;
    use crate::models::PaymentMethod;
    use chrono::Utc;

    fn sample_order(total: i64, method: PaymentMethod) -> Order {
        Order {
            id: "0f8fad5b-d9cb-469f-a165-70867728950e".to_string(),
            total_amount: total,
            payment_method: method,
            created_at: Utc::now(),
            customer_id: None,
        }
    }

    fn sample_lines(order_id: &str) -> Vec<OrderLine> {
        vec![OrderLine {
            id: "l1".to_string(),
            order_id: order_id.to_string(),
            product_id: "SP001".to_string(),
            product_name: "Bánh Mì Pate Đặc Biệt".to_string(),
            quantity: 2,
            price: 35000,
        }]
    }

    #[test]
    fn vnd_grouping() {
        assert_eq!(format_vnd(0), "0");
        assert_eq!(format_vnd(63000), "63.000");
        assert_eq!(format_vnd(1234567), "1.234.567");
        assert_eq!(format_vnd(-50000), "-50.000");
    }

    #[test]
    fn qr_url_carries_bank_amount_and_reference() {
        let url = vietqr_url(63000, "0f8fad5bd9cb469");
        assert!(url.starts_with("https://img.vietqr.io/image/BIDV-56210000599780-compact.png"));
        assert!(url.contains("amount=63000"));
        assert!(url.contains("addInfo=0f8fad5bd9cb469"));
        assert!(url.contains("accountName=LUONG"));
    }

    #[test]
    fn invoice_html_carries_header_items_and_method() {
        let order = sample_order(63000, PaymentMethod::Cash);
        let lines = sample_lines(&order.id);
        let totals = compute_totals(70000, 10);
        let invoice = build(&order, &lines, Some("Tiệm Bánh Hạnh Phúc"), &totals);

        let html = invoice["html"].as_str().unwrap();
        assert!(html.contains(SHOP_NAME));
        assert!(html.contains("Bánh Mì Pate Đặc Biệt"));
        assert!(html.contains("x2"));
        assert!(html.contains("70.000"));
        assert!(html.contains("Chiết khấu (10%)"));
        assert!(html.contains("63.000"));
        assert!(html.contains("Tiền mặt"));
        assert!(html.contains("Tiệm Bánh Hạnh Phúc"));
        assert!(invoice["qrUrl"].as_str().unwrap().contains("amount=63000"));
    }

    #[test]
    fn discount_rows_are_omitted_without_discount() {
        let order = sample_order(35000, PaymentMethod::Debt);
        let lines = sample_lines(&order.id);
        let totals = compute_totals(35000, 0);
        let invoice = build(&order, &lines, None, &totals);
        let html = invoice["html"].as_str().unwrap();
        assert!(!html.contains("Chiết khấu"));
        assert!(!html.contains("Tạm tính"));
        assert!(html.contains("Ghi nợ"));
        assert!(!html.contains("Khách:"));
    }
}
