use std::sync::Arc;

use clap::Args;
use uuid::Uuid;

use signoff_core::domain::event::EventDataValue;
use signoff_core::domain::user::User;
use signoff_core::{
    ApplicationError, EventDataValueError, EventDataValueService, StaticUserProvider,
    TracingAuditSink,
};
use signoff_db::repositories::{
    RepositoryError, SqlDataElementRepository, SqlEventRepository, SqlFileResourceRepository,
    SqlUserRepository,
};
use signoff_db::{connect_with_config, DbPool};

use crate::commands::{load_config, runtime, CommandResult};

#[derive(Debug, Args)]
pub struct EventValueArgs {
    #[arg(long, help = "Event (program stage instance) uid")]
    pub event: String,
    #[arg(long = "data-element", help = "Data element uid")]
    pub data_element: String,
    #[arg(long, help = "Value to store; empty values are ignored")]
    pub value: String,
    #[arg(long, default_value = "admin", help = "Username recorded as storedBy")]
    pub user: String,
}

pub fn run(args: EventValueArgs) -> CommandResult {
    let config = match load_config("event-value") {
        Ok(config) => config,
        Err(result) => return result,
    };

    let runtime = match runtime("event-value") {
        Ok(runtime) => runtime,
        Err(result) => return result,
    };

    let result = runtime.block_on(async {
        let pool = connect_with_config(&config.database)
            .await
            .map_err(RepositoryError::from)
            .map_err(ApplicationError::from)?;
        let saved = save_value(&pool, &args).await;
        pool.close().await;
        saved
    });

    match result {
        Ok(()) => CommandResult::success(
            "event-value",
            format!("stored {} on event {}", args.data_element, args.event),
        ),
        Err(EventDataValueError::Validation(message)) => {
            CommandResult::failure("event-value", "validation", message, 7)
        }
        Err(error @ EventDataValueError::NotFound(_)) => {
            CommandResult::failure("event-value", "not_found", error.to_string(), 8)
        }
        Err(EventDataValueError::Persistence(error)) => CommandResult::from_interface(
            "event-value",
            &error.into_interface(Uuid::new_v4().to_string()),
        ),
    }
}

async fn save_value(pool: &DbPool, args: &EventValueArgs) -> Result<(), EventDataValueError> {
    let user = SqlUserRepository::new(pool.clone())
        .user_by_username(&args.user)
        .await
        .map_err(ApplicationError::from)?
        .unwrap_or_else(|| User { username: args.user.clone(), ..User::default() });

    let events = SqlEventRepository::new(pool.clone());
    let mut event = events
        .find_by_uid(&args.event)
        .await
        .map_err(ApplicationError::from)?
        .ok_or_else(|| ApplicationError::not_found("event", args.event.clone()))?;

    let service = EventDataValueService::new(
        SqlDataElementRepository::new(pool.clone()),
        SqlFileResourceRepository::new(pool.clone()),
        events,
        Arc::new(TracingAuditSink),
        Arc::new(StaticUserProvider::new(user)),
    );

    service
        .save_event_data_value(&mut event, EventDataValue::new(&args.data_element, &args.value))
        .await
}

#[cfg(test)]
mod tests {
    use signoff_db::fixtures::EVENT_UID;
    use signoff_db::repositories::SqlEventRepository;
    use signoff_db::{connect_with_settings, migrations, DbPool, DemoHierarchy};

    use super::{save_value, EventValueArgs};
    use signoff_core::EventDataValueError;

    async fn seeded_pool() -> DbPool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        DemoHierarchy::load(&pool).await.expect("seed");
        pool
    }

    fn args(data_element: &str, value: &str) -> EventValueArgs {
        EventValueArgs {
            event: EVENT_UID.to_owned(),
            data_element: data_element.to_owned(),
            value: value.to_owned(),
            user: "clerk".to_owned(),
        }
    }

    #[tokio::test]
    async fn stores_value_with_the_requesting_user() {
        let pool = seeded_pool().await;

        save_value(&pool, &args("DeVisitDate", "2024-03-14")).await.expect("save");

        let event = SqlEventRepository::new(pool)
            .find_by_uid(EVENT_UID)
            .await
            .expect("load")
            .expect("event");
        let stored = &event.event_data_values["DeVisitDate"];
        assert_eq!(stored.value.as_deref(), Some("2024-03-14"));
        assert_eq!(stored.stored_by.as_deref(), Some("clerk"));
    }

    #[tokio::test]
    async fn rejects_invalid_and_unknown_values() {
        let pool = seeded_pool().await;

        let invalid = save_value(&pool, &args("DeWeight001", "heavy")).await;
        assert!(matches!(invalid, Err(EventDataValueError::Validation(_))));

        let unknown = save_value(&pool, &args("DeUnknown01", "1")).await;
        assert!(matches!(unknown, Err(EventDataValueError::NotFound(_))));
    }
}
