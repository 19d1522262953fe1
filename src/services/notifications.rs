use std::sync::Arc;

use crate::{
    models::{appointment::Appointment, tenant::Tenant},
    services::{
        email::{escape_html, wrap_html, EmailContent, EmailService},
        metrics::EMAILS_COUNTER,
    },
};

/// Appointment lifecycle events that produce an email.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppointmentEvent {
    Confirmation,
    Update,
    Cancellation,
    AdminNewBooking,
    AdminCancellation,
}

impl AppointmentEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentEvent::Confirmation => "confirmation",
            AppointmentEvent::Update => "update",
            AppointmentEvent::Cancellation => "cancellation",
            AppointmentEvent::AdminNewBooking => "admin_new_booking",
            AppointmentEvent::AdminCancellation => "admin_cancellation",
        }
    }

    fn is_admin(&self) -> bool {
        matches!(
            self,
            AppointmentEvent::AdminNewBooking | AppointmentEvent::AdminCancellation
        )
    }
}

/// Link the customer uses to view, reschedule or cancel their booking.
pub fn manage_url(tenant: &Tenant, app_base_url: &str, token: &str) -> String {
    let base = tenant
        .website_url
        .as_deref()
        .unwrap_or(app_base_url)
        .trim_end_matches('/');
    format!("{base}/afspraak/{token}")
}

fn when(a: &Appointment) -> String {
    format!(
        "{} {}",
        a.appointment_date.format("%d-%m-%Y"),
        a.appointment_time.format("%H:%M")
    )
}

pub fn render(event: AppointmentEvent, tenant: &Tenant, a: &Appointment, manage_url: &str) -> EmailContent {
    let business = &tenant.name;
    let when = when(a);
    let name = escape_html(&a.customer_name);

    let (subject, intro, show_link) = match event {
        AppointmentEvent::Confirmation => (
            format!("Appointment confirmed — {business}"),
            format!("Your appointment on {when} is confirmed."),
            true,
        ),
        AppointmentEvent::Update => (
            format!("Appointment changed — {business}"),
            format!("Your appointment has been changed. The new time is {when}."),
            true,
        ),
        AppointmentEvent::Cancellation => (
            format!("Appointment cancelled — {business}"),
            format!("Your appointment on {when} has been cancelled."),
            false,
        ),
        AppointmentEvent::AdminNewBooking => (
            format!("New appointment: {} on {when}", a.customer_name),
            format!("A new appointment was booked for {when}."),
            false,
        ),
        AppointmentEvent::AdminCancellation => (
            format!("Appointment cancelled: {} on {when}", a.customer_name),
            format!("The appointment on {when} was cancelled by the customer."),
            false,
        ),
    };

    let mut text = if event.is_admin() {
        format!(
            "{intro}\n\n\
            Name: {}\nEmail: {}\nPhone: {}\nPostal code: {}\nRemarks: {}\n",
            a.customer_name,
            a.customer_email,
            a.customer_phone,
            a.customer_postal_code,
            a.remarks.as_deref().unwrap_or("-"),
        )
    } else {
        format!("Dear {},\n\n{intro}\n", a.customer_name)
    };
    if show_link {
        text.push_str(&format!(
            "\nView, reschedule or cancel your appointment:\n{manage_url}\n"
        ));
    }
    text.push_str(&format!("\n{business}"));

    let details = if event.is_admin() {
        format!(
            r#"<table role="presentation" style="font-size:14px;color:#334155;line-height:1.6">
  <tr><td style="padding-right:16px">Name</td><td>{name}</td></tr>
  <tr><td style="padding-right:16px">Email</td><td>{}</td></tr>
  <tr><td style="padding-right:16px">Phone</td><td>{}</td></tr>
  <tr><td style="padding-right:16px">Postal code</td><td>{}</td></tr>
  <tr><td style="padding-right:16px">Remarks</td><td>{}</td></tr>
</table>"#,
            escape_html(&a.customer_email),
            escape_html(&a.customer_phone),
            escape_html(&a.customer_postal_code),
            escape_html(a.remarks.as_deref().unwrap_or("-")),
        )
    } else {
        String::new()
    };

    let button = if show_link {
        format!(
            r#"<table role="presentation" cellpadding="0" cellspacing="0" style="margin-top:28px">
  <tr>
    <td style="border-radius:8px;background:#2563eb">
      <a href="{manage_url}" style="display:inline-block;padding:13px 28px;color:#ffffff;text-decoration:none;font-weight:600;font-size:15px;border-radius:8px">Manage appointment</a>
    </td>
  </tr>
</table>"#
        )
    } else {
        String::new()
    };

    let greeting = if event.is_admin() {
        String::new()
    } else {
        format!(r#"Dear <strong style="color:#334155">{name}</strong>,<br><br>"#)
    };

    let content = format!(
        r#"<h1 style="margin:0 0 8px 0;font-size:22px;font-weight:700;color:#0f172a">{}</h1>
<p style="margin:0 0 20px 0;font-size:15px;color:#64748b;line-height:1.6">{greeting}{}</p>
{details}{button}"#,
        escape_html(&subject),
        escape_html(&intro),
    );

    EmailContent {
        subject,
        text,
        html: wrap_html(business, &content),
    }
}

/// Fire-and-forget email dispatch.
/// Spawns a background task — never blocks the request handler,
/// never propagates errors (logs a warning on failure).
pub fn dispatch(
    email: Option<Arc<EmailService>>,
    event: AppointmentEvent,
    tenant: &Tenant,
    appointment: &Appointment,
    app_base_url: &str,
) {
    let Some(email) = email else {
        tracing::debug!("SMTP not configured, skipping {} email", event.as_str());
        return;
    };

    let recipient = if event.is_admin() {
        match tenant
            .notification_email
            .clone()
            .or_else(|| tenant.contact_email.clone())
        {
            Some(addr) => addr,
            None => {
                tracing::debug!("tenant {} has no notification address", tenant.slug);
                return;
            }
        }
    } else {
        appointment.customer_email.clone()
    };
    let recipient_name = (!event.is_admin()).then(|| appointment.customer_name.clone());

    let url = manage_url(tenant, app_base_url, &appointment.edit_token);
    let content = render(event, tenant, appointment, &url);
    let sender = tenant.name.clone();
    let slug = tenant.slug.clone();
    let appointment_id = appointment.id;

    tokio::spawn(async move {
        let res = email
            .send(&sender, &recipient, recipient_name.as_deref(), &content)
            .await;
        let status = if res.is_ok() { "sent" } else { "failed" };
        EMAILS_COUNTER
            .with_label_values(&[&slug, event.as_str(), status])
            .inc();
        if let Err(e) = res {
            tracing::warn!(
                "{} email for appointment {appointment_id} ({slug}) failed: {e:#}",
                event.as_str()
            );
        }
    });
}
