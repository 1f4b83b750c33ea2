//! Due-date buckets over incomplete items, relative to a caller supplied moment.

use chrono::{DateTime, Datelike, Duration, FixedOffset, Months, NaiveDate, Utc};
use sea_orm::{
    ColumnTrait, ConnectionTrait, DbErr, EntityTrait, PaginatorTrait, QueryFilter, Select,
    sea_query::Query,
};
use serde::Serialize;
use ts_rs::TS;

use crate::entities::{checklist, item};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, TS)]
pub struct ItemSummary {
    pub today: u64,
    pub past_due: u64,
    pub this_week: u64,
    pub past_week: u64,
    pub this_month: u64,
    pub past_month: u64,
    pub total: u64,
}

/// Half-open `[start, end)` window.
#[derive(Debug, Clone, Copy)]
struct Window {
    start: DateTime<FixedOffset>,
    end: DateTime<FixedOffset>,
}

impl Window {
    async fn count<C: ConnectionTrait>(
        self,
        db: &C,
        items: &Select<item::Entity>,
    ) -> Result<u64, DbErr> {
        items
            .clone()
            .filter(item::Column::Due.gte(self.start.with_timezone(&Utc)))
            .filter(item::Column::Due.lt(self.end.with_timezone(&Utc)))
            .count(db)
            .await
    }
}

fn midnight(date: NaiveDate, offset: FixedOffset) -> Option<DateTime<FixedOffset>> {
    date.and_hms_opt(0, 0, 0)?
        .and_local_timezone(offset)
        .single()
}

struct Buckets {
    now: DateTime<FixedOffset>,
    today: Window,
    this_week: Window,
    past_week: Window,
    this_month: Window,
    past_month: Window,
}

impl Buckets {
    fn new(now: DateTime<FixedOffset>) -> Option<Self> {
        let offset = *now.offset();
        let date = now.date_naive();

        let day_start = midnight(date, offset)?;
        let day = Duration::days(1);
        let week_start =
            day_start - Duration::days(i64::from(date.weekday().num_days_from_monday()));
        let week = Duration::days(7);

        let first_of_month = date.with_day(1)?;
        let month_start = midnight(first_of_month, offset)?;
        let next_month_start = midnight(first_of_month.checked_add_months(Months::new(1))?, offset)?;
        let prev_month_start = midnight(first_of_month.checked_sub_months(Months::new(1))?, offset)?;

        Some(Self {
            now,
            today: Window {
                start: day_start,
                end: day_start + day,
            },
            this_week: Window {
                start: week_start,
                end: week_start + week,
            },
            past_week: Window {
                start: week_start - week,
                end: week_start,
            },
            this_month: Window {
                start: month_start,
                end: next_month_start,
            },
            past_month: Window {
                start: prev_month_start,
                end: month_start,
            },
        })
    }
}

/// Counts incomplete items, optionally only those on checklists of `object_domain`, by due
/// date. Weeks start on Monday and calendar boundaries are taken in `now`'s own offset.
/// Items without a due date only count towards `total`.
pub async fn item_summary<C: ConnectionTrait>(
    db: &C,
    object_domain: Option<&str>,
    now: DateTime<FixedOffset>,
) -> Result<ItemSummary, DbErr> {
    let mut items = item::Entity::find().filter(item::Column::IsCompleted.eq(false));
    if let Some(domain) = object_domain {
        items = items.filter(
            item::Column::ChecklistId.in_subquery(
                Query::select()
                    .column(checklist::Column::Id)
                    .from(checklist::Entity)
                    .and_where(checklist::Column::ObjectDomain.eq(domain))
                    .to_owned(),
            ),
        );
    }

    let total = items.clone().count(db).await?;
    let Some(buckets) = Buckets::new(now) else {
        tracing::warn!(%now, "summary date has no calendar windows");
        return Ok(ItemSummary {
            total,
            ..Default::default()
        });
    };

    Ok(ItemSummary {
        today: buckets.today.count(db, &items).await?,
        past_due: items
            .clone()
            .filter(item::Column::Due.lt(buckets.now.with_timezone(&Utc)))
            .count(db)
            .await?,
        this_week: buckets.this_week.count(db, &items).await?,
        past_week: buckets.past_week.count(db, &items).await?,
        this_month: buckets.this_month.count(db, &items).await?,
        past_month: buckets.past_month.count(db, &items).await?,
        total,
    })
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use test_support::TempDatabase;

    use super::*;
    use crate::{
        DBService,
        models::{
            bulk::{CompletionAction, apply_completion},
            checklist::{Checklist, CreateChecklist},
            item::{CreateItem, Item},
        },
    };

    fn utc(y: i32, m: u32, d: u32, h: u32) -> Option<DateTime<Utc>> {
        Some(Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap())
    }

    // Wednesday 2024-05-15 12:00 UTC.
    fn now() -> DateTime<FixedOffset> {
        Utc.with_ymd_and_hms(2024, 5, 15, 12, 0, 0).unwrap().fixed_offset()
    }

    async fn seed_dues(dues: &[Option<DateTime<Utc>>]) -> (TempDatabase, DBService) {
        let temp = TempDatabase::new().expect("temp database");
        let db = DBService::new(temp.url()).await.expect("connect");
        let checklist = Checklist::create(
            &db.pool,
            &CreateChecklist {
                object_domain: "contact".to_string(),
                object_id: "1".to_string(),
                description: "Contact".to_string(),
                ..Default::default()
            },
            1,
            Utc::now(),
        )
        .await
        .unwrap();
        for due in dues {
            let data = CreateItem {
                description: "dated".to_string(),
                due: *due,
                ..Default::default()
            };
            Item::create(&db.pool, checklist.checklist.id, &data, 1, Utc::now())
                .await
                .unwrap();
        }
        (temp, db)
    }

    #[tokio::test]
    async fn buckets_relative_to_now() {
        let (_temp, db) = seed_dues(&[
            utc(2024, 5, 15, 8),  // today, past due, this week, this month
            utc(2024, 5, 15, 20), // today, this week, this month
            utc(2024, 5, 13, 0),  // this week (Monday), past due, this month
            utc(2024, 5, 8, 0),   // past week, past due, this month
            utc(2024, 4, 30, 0),  // past month, past due
            utc(2024, 6, 1, 0),   // future, nothing
            None,
        ])
        .await;
        let summary = item_summary(&db.pool, None, now()).await.unwrap();
        assert_eq!(
            summary,
            ItemSummary {
                today: 2,
                past_due: 4,
                this_week: 3,
                past_week: 1,
                this_month: 4,
                past_month: 1,
                total: 7,
            }
        );
    }

    #[tokio::test]
    async fn calendar_boundaries_follow_the_given_offset() {
        // 23:00 UTC on the 15th is already the 16th at +07:00.
        let plus_seven = FixedOffset::east_opt(7 * 3600).unwrap();
        let now = plus_seven.with_ymd_and_hms(2024, 5, 16, 9, 0, 0).unwrap();
        let (_temp, db) = seed_dues(&[utc(2024, 5, 15, 23), utc(2024, 5, 15, 16)]).await;
        let summary = item_summary(&db.pool, None, now).await.unwrap();
        assert_eq!(summary.today, 1);
        assert_eq!(summary.past_due, 2);
    }

    #[tokio::test]
    async fn no_items_is_all_zero() {
        let (_temp, db) = seed_dues(&[]).await;
        let summary = item_summary(&db.pool, None, now()).await.unwrap();
        assert_eq!(summary, ItemSummary::default());
    }

    #[tokio::test]
    async fn summary_ignores_completed_items_and_other_domains() {
        let temp = TempDatabase::new().expect("temp database");
        let db = DBService::new(temp.url()).await.expect("connect");

        let contact = Checklist::create(
            &db.pool,
            &CreateChecklist {
                object_domain: "contact".to_string(),
                object_id: "1".to_string(),
                description: "Contact".to_string(),
                ..Default::default()
            },
            1,
            Utc::now(),
        )
        .await
        .unwrap();
        let deal = Checklist::create(
            &db.pool,
            &CreateChecklist {
                object_domain: "deal".to_string(),
                object_id: "2".to_string(),
                description: "Deal".to_string(),
                ..Default::default()
            },
            1,
            Utc::now(),
        )
        .await
        .unwrap();

        let today = CreateItem {
            description: "today".to_string(),
            due: utc(2024, 5, 15, 18),
            ..Default::default()
        };
        let open = Item::create(&db.pool, contact.checklist.id, &today, 1, Utc::now())
            .await
            .unwrap();
        let done = Item::create(&db.pool, contact.checklist.id, &today, 1, Utc::now())
            .await
            .unwrap();
        Item::create(&db.pool, deal.checklist.id, &today, 1, Utc::now())
            .await
            .unwrap();
        apply_completion(&db.pool, &[done.id], CompletionAction::Complete, 1, Utc::now())
            .await
            .unwrap();

        let summary = item_summary(&db.pool, Some("contact"), now()).await.unwrap();
        assert_eq!(summary.total, 1);
        assert_eq!(summary.today, 1);
        assert_ne!(open.id, done.id);

        let everything = item_summary(&db.pool, None, now()).await.unwrap();
        assert_eq!(everything.total, 2);
    }
}
