//! HTML alert bodies.

use chrono::{DateTime, Utc};

use crate::types::{AlertPayload, AnomalyEvent};

const DISPLAY_TIME: &str = "%d/%m/%Y %H:%M";

/// Escape text interpolated into HTML.
pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn wrap(title: &str, content: &str, generated_at: DateTime<Utc>) -> String {
    format!(
        r#"<html>
  <body style="font-family: Arial, sans-serif; background-color: #f4f4f4; padding: 20px;">
    <div style="max-width: 640px; margin: auto; background: #fff; padding: 20px; border-radius: 8px;">
      <h2 style="color: #e60000; text-align: center;">{title}</h2>
{content}
      <p style="color: #555; font-size: 12px; text-align: center;">Generated by plantwatch at {generated}</p>
    </div>
  </body>
</html>"#,
        generated = generated_at.format(DISPLAY_TIME),
    )
}

/// Alert for a machine that has been stopped for `hours` whole hours.
pub fn stop_alert(
    machine_id: &str,
    stopped_since: DateTime<Utc>,
    hours: i64,
    recipient: &str,
    now: DateTime<Utc>,
) -> AlertPayload {
    let machine = escape_html(machine_id);
    let content = format!(
        r#"      <p style="font-size: 16px; color: #333;">
        Machine <strong>{machine}</strong> has been stopped for <strong>{hours} hours</strong>.<br>
        Stopped since: <strong>{since}</strong>
      </p>"#,
        since = stopped_since.format(DISPLAY_TIME),
    );

    AlertPayload {
        subject: format!("Machine {machine_id} stopped for {hours}h"),
        html_body: wrap("Machine Stopped", &content, now),
        recipient: recipient.to_string(),
    }
}

/// One alert batching every fresh anomaly of a machine.
pub fn anomaly_alert(
    machine_id: &str,
    events: &[AnomalyEvent],
    scorer: &str,
    recipient: &str,
    now: DateTime<Utc>,
) -> AlertPayload {
    let rows: String = events
        .iter()
        .map(|e| {
            format!(
                "        <tr><td>{}</td><td>{:.2}</td><td>{:.2}</td><td>{:.2}</td></tr>\n",
                e.timestamp.format(DISPLAY_TIME),
                e.value,
                e.lower_bound,
                e.upper_bound,
            )
        })
        .collect();

    let content = format!(
        r#"      <p style="font-size: 16px; color: #333;">
        {count} anomalous reading(s) on machine <strong>{machine}</strong>.
      </p>
      <p style="font-size: 16px;"><strong>Scorer:</strong> {scorer}</p>
      <table border="1" style="border-collapse: collapse; margin: auto;">
        <tr><th>Timestamp</th><th>Value</th><th>Lower bound</th><th>Upper bound</th></tr>
{rows}      </table>"#,
        count = events.len(),
        machine = escape_html(machine_id),
        scorer = escape_html(scorer),
    );

    AlertPayload {
        subject: format!("Anomalies detected on {machine_id} ({} reading(s))", events.len()),
        html_body: wrap("Anomalies Detected", &content, now),
        recipient: recipient.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_stop_alert_subject_and_start_time() {
        let since = Utc.with_ymd_and_hms(2025, 3, 1, 6, 30, 0).unwrap();
        let now = Utc.with_ymd_and_hms(2025, 3, 1, 10, 30, 0).unwrap();
        let payload = stop_alert("G19", since, 4, "ops@plant.local", now);
        assert_eq!(payload.subject, "Machine G19 stopped for 4h");
        assert!(payload.html_body.contains("01/03/2025 06:30"));
        assert_eq!(payload.recipient, "ops@plant.local");
    }

    #[test]
    fn test_anomaly_alert_has_row_per_event() {
        let ts = Utc.with_ymd_and_hms(2025, 3, 1, 6, 30, 0).unwrap();
        let event = AnomalyEvent {
            machine_id: "G26".into(),
            timestamp: ts,
            value: 135.0,
            lower_bound: 70.0,
            upper_bound: 130.0,
            mean: 100.0,
            score: Some(3.5),
        };
        let payload = anomaly_alert("G26", &[event.clone(), event], "threshold", "ops", ts);
        assert_eq!(payload.html_body.matches("<td>135.00</td>").count(), 2);
        assert!(payload.subject.contains("2 reading(s)"));
        let row = "<tr><td>01/03/2025 06:30</td><td>135.00</td><td>70.00</td><td>130.00</td></tr>\n";
        assert_eq!(payload.html_body.matches(row).count(), 2);
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html("<b>&\"x'"), "&lt;b&gt;&amp;&quot;x&#39;");
    }
}
