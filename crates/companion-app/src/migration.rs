//! Demo data migration.

use companion_core::{Role, collections};
use companion_sync::DocumentStore;
use companion_views::Clock;
use serde_json::{Map, Value, json};
use time::macros::format_description;
use tracing::{error, info};

use crate::{AppError, DashboardSession};

/// One collection of the demo dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct DemoCollection {
    /// Target collection.
    pub name: &'static str,
    /// Documents as `(id, fields)`.
    pub documents: Vec<(String, Map<String, Value>)>,
}

/// Final status of a migration run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigrationStatus {
    /// Every collection was written.
    Success,
    /// The run stopped at a failed write.
    Error(String),
}

/// Progress log and status of a migration run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationReport {
    /// Timestamped progress lines.
    pub log: Vec<String>,
    /// Final status.
    pub status: MigrationStatus,
    /// Documents written before the run ended.
    pub written: usize,
}

impl MigrationReport {
    /// Returns `true` when every collection was written.
    pub fn succeeded(&self) -> bool {
        self.status == MigrationStatus::Success
    }
}

/// Writes `dataset` into `store` collection by collection.
///
/// Documents keep their ids, so re-running the migration overwrites rather
/// than duplicates. The run stops at the first failed write.
pub fn migrate_demo_data(
    store: &dyn DocumentStore,
    dataset: &[DemoCollection],
    clock: &dyn Clock,
) -> MigrationReport {
    let mut log = Vec::new();
    let mut written = 0;

    progress(&mut log, clock, "Starting migration...".to_string());
    for collection in dataset {
        progress(&mut log, clock, format!("Migrating {}...", collection.name));
        for (id, fields) in &collection.documents {
            if let Err(failure) = store.set(collection.name, id, fields.clone()) {
                error!(stage = "migration", action = "write_failed", collection = collection.name,
                    id = %id, error = %failure);
                progress(&mut log, clock, format!("ERROR: {failure}"));
                return MigrationReport {
                    log,
                    status: MigrationStatus::Error(failure.to_string()),
                    written,
                };
            }
            written += 1;
        }
        info!(stage = "migration", action = "collection_written", collection = collection.name,
            count = collection.documents.len());
        progress(
            &mut log,
            clock,
            format!(
                "Successfully migrated {} ({} items)",
                collection.name,
                collection.documents.len()
            ),
        );
    }
    progress(&mut log, clock, "Migration complete!".to_string());

    MigrationReport {
        log,
        status: MigrationStatus::Success,
        written,
    }
}

fn progress(log: &mut Vec<String>, clock: &dyn Clock, message: String) {
    let stamp = clock
        .now()
        .format(format_description!("[hour]:[minute]:[second]"))
        .unwrap_or_default();
    log.push(format!("{stamp}: {message}"));
}

impl DashboardSession {
    /// Seeds the session's store with [`demo_dataset`].
    ///
    /// # Errors
    /// Returns [`AppError::NotAuthenticated`] or [`AppError::Forbidden`] when
    /// the operator is not a super admin. Write failures are reported in the
    /// returned [`MigrationReport`].
    pub fn seed_demo_data(&self) -> Result<MigrationReport, AppError> {
        self.require_role("seed demo data", &[Role::SuperAdmin])?;
        Ok(migrate_demo_data(
            self.store.as_ref(),
            &demo_dataset(),
            self.clock.as_ref(),
        ))
    }
}

/// The fixed demo dataset.
pub fn demo_dataset() -> Vec<DemoCollection> {
    vec![
        keyed(
            collections::USERS,
            json!([
                { "id": "u1", "name": "Amara Nkosi", "email": "amara@example.com", "role": "super_admin",
                  "status": "active", "createdAt": "2025-10-01", "lastActive": "2026-02-22" },
                { "id": "u2", "name": "Sipho Dlamini", "email": "sipho@example.com", "role": "moderator",
                  "status": "active", "createdAt": "2025-11-15", "lastActive": "2026-02-21" },
                { "id": "u3", "name": "Thandi Mokoena", "email": "thandi@example.com", "role": "health_admin",
                  "status": "active", "createdAt": "2025-12-01", "lastActive": "2026-02-20" },
                { "id": "u4", "name": "Lebo Sithole", "email": "lebo@example.com", "role": "cyber_admin",
                  "status": "suspended", "createdAt": "2025-09-20", "lastActive": "2026-02-10" },
                { "id": "u5", "name": "Neo Khumalo", "email": "neo@example.com", "role": "health_admin",
                  "status": "active", "createdAt": "2026-01-05", "lastActive": "2026-02-22" },
                { "id": "u6", "name": "Zara Patel", "email": "zara@example.com", "role": "moderator",
                  "status": "active", "createdAt": "2026-01-12", "lastActive": "2026-02-19" },
                { "id": "u7", "name": "Kagiso Baloyi", "email": "kagiso@example.com", "role": "user",
                  "status": "active", "createdAt": "2026-02-01", "lastActive": "2026-02-22" },
                { "id": "u8", "name": "Fatima Osman", "email": "fatima@example.com", "role": "user",
                  "status": "suspended", "createdAt": "2025-08-14", "lastActive": "2025-12-30" },
            ]),
        ),
        keyed(
            collections::EMERGENCY_CALLS,
            json!([
                { "id": "ec1", "type": "Police", "timestamp": "2026-02-22T06:14:00", "userId": "u7",
                  "location": { "lat": -26.2, "lng": 28.04 }, "responseTime": 2.1 },
                { "id": "ec2", "type": "Ambulance", "timestamp": "2026-02-22T07:32:00", "userId": "u3",
                  "location": { "lat": -26.21, "lng": 28.05 }, "responseTime": 3.5 },
                { "id": "ec3", "type": "Fire", "timestamp": "2026-02-22T08:11:00", "userId": "u6",
                  "location": { "lat": -26.19, "lng": 28.03 }, "responseTime": 4.2 },
                { "id": "ec4", "type": "GBV", "timestamp": "2026-02-22T09:00:00", "userId": "u5",
                  "location": { "lat": -26.2, "lng": 28.06 }, "responseTime": 1.8 },
                { "id": "ec5", "type": "Cyber", "timestamp": "2026-02-22T10:22:00", "userId": "u2",
                  "location": { "lat": -26.22, "lng": 28.04 }, "responseTime": 0.5 },
                { "id": "ec6", "type": "Police", "timestamp": "2026-02-21T14:00:00", "userId": "u7",
                  "location": { "lat": -26.2, "lng": 28.04 }, "responseTime": 2.8 },
                { "id": "ec7", "type": "Ambulance", "timestamp": "2026-02-21T16:30:00", "userId": "u3",
                  "location": { "lat": -26.21, "lng": 28.05 }, "responseTime": 3.1 },
                { "id": "ec8", "type": "Police", "timestamp": "2026-02-20T11:00:00", "userId": "u6",
                  "location": { "lat": -26.19, "lng": 28.03 }, "responseTime": 2.0 },
            ]),
        ),
        keyed(
            collections::SCAM_REPORTS,
            json!([
                { "id": "sr1", "message": "SASSA grant has been approved. Click link to claim your R1400...",
                  "riskLevel": "HIGH RISK", "timestamp": "2026-02-22T08:00:00", "userId": "u7" },
                { "id": "sr2", "message": "Your Capitec OTP is 482910. Never share this with anyone.",
                  "riskLevel": "CAUTION", "timestamp": "2026-02-22T09:15:00", "userId": "u5" },
                { "id": "sr3", "message": "Congratulations! You have won R50,000 in our MTN lottery!",
                  "riskLevel": "HIGH RISK", "timestamp": "2026-02-22T10:00:00", "userId": "u2" },
                { "id": "sr4", "message": "Your loan of R15,000 has been approved. Reply YES to confirm.",
                  "riskLevel": "CAUTION", "timestamp": "2026-02-21T14:00:00", "userId": "u6" },
                { "id": "sr5", "message": "Hi, I saw your CV online and have a job offer for you.",
                  "riskLevel": "SAFE", "timestamp": "2026-02-21T11:00:00", "userId": "u3" },
            ]),
        ),
        keyed(
            collections::DOCTORS,
            json!([
                { "id": "d1", "name": "Dr. Precious Molefe", "specialization": "General Practitioner",
                  "phone": "+27 11 000 1111", "rating": 4.8, "availability": "Mon-Fri" },
                { "id": "d2", "name": "Dr. James Okafor", "specialization": "Cardiologist",
                  "phone": "+27 11 000 2222", "rating": 4.6, "availability": "Mon-Wed" },
                { "id": "d3", "name": "Dr. Sarah Naidoo", "specialization": "Paediatrician",
                  "phone": "+27 11 000 3333", "rating": 4.9, "availability": "Tue-Sat" },
                { "id": "d4", "name": "Dr. Bongani Zulu", "specialization": "Emergency Medicine",
                  "phone": "+27 11 000 4444", "rating": 4.7, "availability": "24/7" },
            ]),
        ),
        keyed(
            collections::STATIONS,
            json!([
                { "id": "st1", "name": "Johannesburg Central Police", "type": "Police",
                  "phone": "011 375 5000", "location": "JHB CBD", "rating": 4.2, "status": "Open" },
                { "id": "st2", "name": "Charlotte Maxeke Hospital", "type": "Hospital",
                  "phone": "011 488 3911", "location": "Parktown", "rating": 4.5, "status": "Open" },
                { "id": "st3", "name": "Sandton Fire Station", "type": "Fire",
                  "phone": "011 375 5000", "location": "Sandton", "rating": 4.0, "status": "Open" },
                { "id": "st4", "name": "Soweto Police Station", "type": "Police",
                  "phone": "011 982 5000", "location": "Soweto", "rating": 3.8, "status": "Open" },
                { "id": "st5", "name": "Helen Joseph Hospital", "type": "Hospital",
                  "phone": "011 489 1011", "location": "Auckland Park", "rating": 4.3, "status": "Closed" },
            ]),
        ),
        keyed(
            collections::NEWS,
            json!([
                { "id": "n1", "title": "Rise in WhatsApp Phishing Scams Across SA", "source": "SABRIC",
                  "publishedAt": "2026-02-22", "imageUrl": "", "pinned": true },
                { "id": "n2", "title": "SAPS Launches Emergency App Integration", "source": "SAPS",
                  "publishedAt": "2026-02-21", "imageUrl": "", "pinned": false },
                { "id": "n3", "title": "Health Advisory: Cholera Outbreak in Limpopo",
                  "source": "Dept of Health", "publishedAt": "2026-02-20", "imageUrl": "", "pinned": true },
                { "id": "n4", "title": "New GBV Hotline Numbers Now Active", "source": "GBVF Council",
                  "publishedAt": "2026-02-19", "imageUrl": "", "pinned": false },
            ]),
        ),
        keyed(
            collections::HOTLINES,
            json!([
                { "service": "Police", "number": "10111" },
                { "service": "Ambulance", "number": "10177" },
                { "service": "Fire", "number": "10111" },
                { "service": "GBV Helpline", "number": "0800 428 428" },
                { "service": "Cyber Crime", "number": "0800 023 999" },
                { "service": "Child Support", "number": "116" },
            ]),
        ),
    ]
}

/// Splits a JSON array into id-keyed documents. Entries without an `id` get
/// `<collection>_<position>`.
fn keyed(name: &'static str, items: Value) -> DemoCollection {
    let documents = match items {
        Value::Array(items) => items
            .into_iter()
            .enumerate()
            .filter_map(|(index, item)| match item {
                Value::Object(mut fields) => {
                    let id = match fields.remove("id") {
                        Some(Value::String(id)) => id,
                        _ => format!("{name}_{}", index + 1),
                    };
                    Some((id, fields))
                }
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    };
    DemoCollection { name, documents }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_document_has_a_unique_id() {
        for collection in demo_dataset() {
            let mut ids: Vec<_> = collection.documents.iter().map(|(id, _)| id.clone()).collect();
            let total = ids.len();
            ids.sort();
            ids.dedup();
            assert_eq!(ids.len(), total, "duplicate ids in {}", collection.name);
        }
    }

    #[test]
    fn documents_without_ids_are_numbered() {
        let hotlines = keyed("hotlines", json!([{ "service": "Police" }, { "service": "Fire" }]));
        assert_eq!(hotlines.documents[0].0, "hotlines_1");
        assert_eq!(hotlines.documents[1].0, "hotlines_2");
    }
}
