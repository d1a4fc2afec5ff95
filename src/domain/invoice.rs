use chrono::{DateTime, Utc};
use printpdf::{BuiltinFont, Mm, PdfDocument};
use serde_json::Value;

use super::errors::DomainError;
use super::order::{Order, OrderItem};
use super::pricing::money_string;

pub const CONTENT_TYPE: &str = "application/pdf";

const PAGE_WIDTH: f32 = 210.0;
const PAGE_HEIGHT: f32 = 297.0;
const MARGIN: f32 = 20.0;

// Column offsets of the line-item table, in millimetres from the left edge.
const COLUMNS: [f32; 5] = [20.0, 110.0, 125.0, 150.0, 170.0];

/// `ORD-<millis>-<suffix>` becomes `INV-<millis>-<suffix>`.
pub fn invoice_number(order_number: &str) -> String {
    let suffix = order_number.strip_prefix("ORD-").unwrap_or(order_number);
    format!("INV-{suffix}")
}

pub struct InvoiceParty<'a> {
    pub name: Option<&'a str>,
    pub email: Option<&'a str>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Weight {
    Regular,
    Bold,
}

/// One text cell placed `x` millimetres from the left edge.
#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    pub x: f32,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub size: f32,
    pub weight: Weight,
    pub cells: Vec<Cell>,
}

impl Row {
    fn text(size: f32, weight: Weight, text: impl Into<String>) -> Self {
        Self {
            size,
            weight,
            cells: vec![Cell {
                x: MARGIN,
                text: text.into(),
            }],
        }
    }

    fn columns(weight: Weight, values: [String; 5]) -> Self {
        Self {
            size: 9.0,
            weight,
            cells: COLUMNS
                .iter()
                .zip(values)
                .map(|(x, text)| Cell { x: *x, text })
                .collect(),
        }
    }

    fn blank() -> Self {
        Self {
            size: 6.0,
            weight: Weight::Regular,
            cells: Vec::new(),
        }
    }

    /// Vertical space the row takes, in millimetres.
    fn height(&self) -> f32 {
        self.size * 0.5 + 1.5
    }
}

/// Page-independent invoice content, top to bottom.
#[derive(Debug, Clone)]
pub struct InvoiceLayout {
    pub title: String,
    pub rows: Vec<Row>,
}

impl InvoiceLayout {
    pub fn new(
        number: &str,
        order: &Order,
        items: &[OrderItem],
        seller: &InvoiceParty<'_>,
        buyer: &InvoiceParty<'_>,
        issued_at: DateTime<Utc>,
    ) -> Self {
        let mut rows = vec![
            Row::text(18.0, Weight::Bold, "Loadify Market"),
            Row::text(14.0, Weight::Bold, format!("Invoice {number}")),
            Row::text(10.0, Weight::Regular, format!("Order {}", order.order_number)),
            Row::text(
                10.0,
                Weight::Regular,
                format!("Issued {}", issued_at.format("%d %B %Y")),
            ),
            Row::blank(),
        ];

        rows.push(Row::text(10.0, Weight::Bold, "Seller"));
        rows.extend(block(party(seller)));
        rows.push(Row::blank());
        rows.push(Row::text(10.0, Weight::Bold, "Bill to"));
        rows.extend(block(party(buyer)));
        rows.extend(block(address(&order.billing_address)));
        rows.push(Row::blank());
        rows.push(Row::text(10.0, Weight::Bold, "Ship to"));
        rows.extend(block(address(&order.shipping_address)));
        rows.push(Row::blank());

        rows.push(Row::columns(
            Weight::Bold,
            ["Item", "Qty", "Unit price", "VAT", "Line total"].map(String::from),
        ));
        for item in items {
            rows.push(Row::columns(
                Weight::Regular,
                [
                    item.title.clone(),
                    item.quantity.to_string(),
                    gbp(&money_string(&item.unit_price)),
                    gbp(&money_string(&item.vat_amount)),
                    gbp(&money_string(&item.line_total)),
                ],
            ));
        }
        rows.push(Row::blank());

        rows.push(Row::text(
            10.0,
            Weight::Regular,
            format!("Subtotal: {}", gbp(&money_string(&order.subtotal))),
        ));
        rows.push(Row::text(
            10.0,
            Weight::Regular,
            format!("VAT (20%): {}", gbp(&money_string(&order.vat_amount))),
        ));
        rows.push(Row::text(
            11.0,
            Weight::Bold,
            format!("Total: {}", gbp(&money_string(&order.total))),
        ));

        Self {
            title: format!("Invoice {number}"),
            rows,
        }
    }

    /// Every cell's text in reading order.
    pub fn lines(&self) -> impl Iterator<Item = String> + '_ {
        self.rows.iter().map(|row| {
            row.cells
                .iter()
                .map(|c| c.text.as_str())
                .collect::<Vec<_>>()
                .join(" | ")
        })
    }

    /// A4 PDF with the standard Helvetica fonts, paginated as needed.
    pub fn to_pdf(&self) -> Result<Vec<u8>, DomainError> {
        let (doc, page, layer) = PdfDocument::new(
            &self.title,
            Mm(PAGE_WIDTH),
            Mm(PAGE_HEIGHT),
            "Invoice",
        );
        let regular = doc
            .add_builtin_font(BuiltinFont::Helvetica)
            .map_err(pdf_error)?;
        let bold = doc
            .add_builtin_font(BuiltinFont::HelveticaBold)
            .map_err(pdf_error)?;
        let mut current = doc.get_page(page).get_layer(layer);
        let mut y = PAGE_HEIGHT - MARGIN;
        for row in &self.rows {
            if y - row.height() < MARGIN {
                let (page, layer) = doc.add_page(Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Invoice");
                current = doc.get_page(page).get_layer(layer);
                y = PAGE_HEIGHT - MARGIN;
            }
            y -= row.height();
            let font = match row.weight {
                Weight::Regular => &regular,
                Weight::Bold => &bold,
            };
            for cell in &row.cells {
                current.use_text(
                    printable(&cell.text),
                    row.size,
                    Mm(cell.x),
                    Mm(y),
                    font,
                );
            }
        }

        doc.save_to_bytes().map_err(pdf_error)
    }
}

/// Lays out and renders the invoice of one order.
pub fn render_invoice(
    number: &str,
    order: &Order,
    items: &[OrderItem],
    seller: &InvoiceParty<'_>,
    buyer: &InvoiceParty<'_>,
    issued_at: DateTime<Utc>,
) -> Result<Vec<u8>, DomainError> {
    InvoiceLayout::new(number, order, items, seller, buyer, issued_at).to_pdf()
}

fn pdf_error(e: impl std::fmt::Display) -> DomainError {
    DomainError::Internal(format!("Failed to render invoice: {e}"))
}

// The standard fonts only cover single-byte text.
fn printable(text: &str) -> String {
    text.chars()
        .map(|c| if c.is_ascii() && !c.is_ascii_control() { c } else { '?' })
        .collect()
}

fn gbp(amount: &str) -> String {
    format!("GBP {amount}")
}

fn block(lines: Vec<String>) -> impl Iterator<Item = Row> {
    lines
        .into_iter()
        .map(|line| Row::text(10.0, Weight::Regular, line))
}

fn party(p: &InvoiceParty<'_>) -> Vec<String> {
    [p.name, p.email]
        .into_iter()
        .flatten()
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn address(value: &Value) -> Vec<String> {
    ["name", "line1", "line2", "city", "postalCode", "country"]
        .iter()
        .filter_map(|key| value[*key].as_str())
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}
