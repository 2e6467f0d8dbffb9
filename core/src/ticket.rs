//! Downloadable ticket documents.
//!
//! Rendering is a pure function of a fulfilled [`Booking`] and its settled
//! [`Payment`]: no clock, no I/O, and identical input always produces
//! byte-identical output.

use crate::booking::{Booking, BookingStatus, Payment, PaymentStatus};
use crate::error::BookingError;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

const TITLE: &str = "Rail Tikit E-Ticket";
const FOOTER: &str = "Please arrive 30 minutes before departure time.";
const BOOKED_AT_FORMAT: &str = "%Y-%m-%d %H:%M UTC";

/// Output format of a ticket
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TicketFormat {
    /// Self-contained HTML page with inline styles
    Html,
    /// Fixed-width plain text
    Text,
}

impl TicketFormat {
    const fn extension(self) -> &'static str {
        match self {
            Self::Html => "html",
            Self::Text => "txt",
        }
    }

    const fn media_type(self) -> &'static str {
        match self {
            Self::Html => "text/html",
            Self::Text => "text/plain",
        }
    }
}

/// A rendered ticket, ready to be saved or served
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TicketArtifact {
    /// Suggested file name (`Railway_Ticket_<id>.<ext>`)
    pub file_name: String,
    /// MIME type of `body`
    pub media_type: &'static str,
    /// Document contents
    pub body: String,
}

/// Renders a ticket for a fulfilled booking.
///
/// # Errors
///
/// Returns [`BookingError::NotReady`] unless the booking is confirmed and
/// the payment is settled for that same booking and amount.
pub fn render(
    booking: &Booking,
    payment: &Payment,
    format: TicketFormat,
) -> Result<TicketArtifact, BookingError> {
    ensure_fulfilled(booking, payment)?;

    let body = match format {
        TicketFormat::Html => render_html(booking, payment),
        TicketFormat::Text => render_text(booking, payment),
    };

    Ok(TicketArtifact {
        file_name: format!("Railway_Ticket_{}.{}", booking.booking_id, format.extension()),
        media_type: format.media_type(),
        body,
    })
}

fn ensure_fulfilled(booking: &Booking, payment: &Payment) -> Result<(), BookingError> {
    let not_ready = |reason: String| Err(BookingError::NotReady { reason });

    if booking.status != BookingStatus::Confirmed {
        return not_ready(format!("booking {} is {}", booking.booking_id, booking.status));
    }
    if payment.booking_id != booking.booking_id {
        return not_ready(format!(
            "payment belongs to booking {}, not {}",
            payment.booking_id, booking.booking_id
        ));
    }
    if payment.status != PaymentStatus::Settled {
        return not_ready(format!(
            "payment for booking {} is {}",
            booking.booking_id, payment.status
        ));
    }
    if payment.amount != booking.total_amount {
        return not_ready(format!(
            "settled {} does not cover {}",
            payment.amount, booking.total_amount
        ));
    }
    Ok(())
}

/// Label/value rows shared by both formats
fn summary_rows(booking: &Booking, payment: &Payment) -> Vec<(&'static str, String)> {
    let request = &booking.request;
    vec![
        ("Booking ID", booking.booking_id.to_string()),
        ("Train", request.train_id().to_string()),
        (
            "Route",
            format!("{} to {}", request.from_station(), request.to_station()),
        ),
        ("Journey Date", request.journey_date().to_string()),
        ("Booked At", booking.reserved_at.format(BOOKED_AT_FORMAT).to_string()),
        ("Coach Type", request.coach_type().display_name()),
        ("Tickets", booking.allocated_seats.len().to_string()),
        ("Price per Ticket", booking.unit_price().to_string()),
        ("Total Paid", payment.amount.to_string()),
        ("Payment Method", payment.method.to_string()),
    ]
}

fn render_text(booking: &Booking, payment: &Payment) -> String {
    let rule = "=".repeat(48);
    let mut out = String::new();

    // Writing to a String cannot fail.
    let _ = writeln!(out, "{rule}");
    let _ = writeln!(out, "{TITLE:^48}");
    let _ = writeln!(out, "{rule}");
    for (label, value) in summary_rows(booking, payment) {
        let _ = writeln!(out, "{:<18}{value}", format!("{label}:"));
    }
    let _ = writeln!(out, "{}", "-".repeat(48));
    let _ = writeln!(out, "Seats:");
    for seat in &booking.allocated_seats {
        let _ = writeln!(out, "  {seat}");
    }
    let _ = writeln!(out, "{rule}");
    let _ = writeln!(out, "{FOOTER}");
    out
}

fn render_html(booking: &Booking, payment: &Payment) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "<!DOCTYPE html>");
    let _ = writeln!(out, "<html lang=\"en\">");
    let _ = writeln!(out, "<head>");
    let _ = writeln!(out, "<meta charset=\"utf-8\">");
    let _ = writeln!(
        out,
        "<title>{TITLE} #{}</title>",
        escape_html(&booking.booking_id.to_string())
    );
    let _ = writeln!(out, "</head>");
    let _ = writeln!(
        out,
        "<body style=\"font-family: Arial, sans-serif; max-width: 640px; margin: 24px auto; color: #1f2937;\">"
    );
    let _ = writeln!(
        out,
        "<h1 style=\"text-align: center; color: #166534;\">{TITLE}</h1>"
    );
    let _ = writeln!(
        out,
        "<table style=\"width: 100%; border-collapse: collapse;\">"
    );
    for (label, value) in summary_rows(booking, payment) {
        let _ = writeln!(
            out,
            "<tr><th style=\"text-align: left; padding: 4px 8px;\">{label}</th><td style=\"padding: 4px 8px;\">{}</td></tr>",
            escape_html(&value)
        );
    }
    let _ = writeln!(out, "</table>");
    let _ = writeln!(out, "<h2 style=\"font-size: 16px;\">Seats</h2>");
    let _ = writeln!(out, "<ul>");
    for seat in &booking.allocated_seats {
        let _ = writeln!(out, "<li>{}</li>", escape_html(&seat.to_string()));
    }
    let _ = writeln!(out, "</ul>");
    let _ = writeln!(
        out,
        "<p style=\"text-align: center; font-size: 12px; color: #6b7280;\">{FOOTER}</p>"
    );
    let _ = writeln!(out, "</body>");
    let _ = writeln!(out, "</html>");
    out
}

fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
