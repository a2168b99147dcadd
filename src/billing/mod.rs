//! Billing
//!
//! - **numbering**: `FAC-<n>` invoice numbers derived from existing ones
//! - **totals**: subtotal / tax / total of a single-line invoice
//! - **invoices**: invoice records and [`InvoiceService`]
//! - **payments**: payment records and the payment registration saga

pub mod invoices;
pub mod numbering;
pub mod payments;
pub mod totals;

pub use invoices::{Invoice, InvoiceForm, InvoiceItem, InvoiceService, InvoiceStatus, InvoiceSummary};
pub use numbering::{next_invoice_number, InvoiceNumbering};
pub use payments::{Payment, PaymentForm, PaymentMethod, PaymentReceipt};
pub use totals::{InvoiceTotals, DEFAULT_TAX_RATE};
