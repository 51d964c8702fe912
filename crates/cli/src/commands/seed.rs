use crate::commands::{load_config, runtime, CommandResult};
use signoff_db::{connect_with_config, migrations, DemoHierarchy, SeedResult};

pub fn run() -> CommandResult {
    let config = match load_config("seed") {
        Ok(config) => config,
        Err(result) => return result,
    };

    let runtime = match runtime("seed") {
        Ok(runtime) => runtime,
        Err(result) => return result,
    };

    let result = runtime.block_on(async {
        let pool = connect_with_config(&config.database)
            .await
            .map_err(|error| ("db_connectivity", error.to_string(), 4u8))?;

        migrations::run_pending(&pool)
            .await
            .map_err(|error| ("migration", error.to_string(), 5u8))?;

        let seed_result = DemoHierarchy::load(&pool)
            .await
            .map_err(|error| ("seed_execution", error.to_string(), 5u8))?;

        let verification = DemoHierarchy::verify(&pool)
            .await
            .map_err(|error| ("seed_verification", error.to_string(), 6u8))?;

        let run_result: Result<SeedResult, (&'static str, String, u8)> =
            if verification.all_present {
                Ok(seed_result)
            } else {
                Err(("seed_verification", verification_failure_message(&verification.checks), 6u8))
            };

        pool.close().await;
        run_result
    });

    match result {
        Ok(seeded) => CommandResult::success("seed", render_seed_summary(&seeded)),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("seed", error_class, message, exit_code)
        }
    }
}

fn verification_failure_message(checks: &[(&str, bool)]) -> String {
    let failed_checks =
        checks.iter().filter_map(|(check, passed)| (!passed).then_some(*check)).collect::<Vec<_>>();

    if failed_checks.is_empty() {
        "Some seed data failed to load".to_string()
    } else {
        format!("Seed verification failed for checks: {}", failed_checks.join(", "))
    }
}

fn render_seed_summary(seeded: &SeedResult) -> String {
    format!(
        "demo hierarchy loaded: workflow {} for period {}\n  - org units: {}\n  - users: {}",
        seeded.workflow_uid,
        seeded.period_iso,
        seeded.org_unit_uids.join(", "),
        seeded.usernames.join(", ")
    )
}

#[cfg(test)]
mod tests {
    use super::{render_seed_summary, verification_failure_message};
    use signoff_db::SeedResult;

    #[test]
    fn verification_error_message_targets_failed_checks() {
        let checks = [("organisationunit", true), ("workflow-levels", false), ("dataelement", false)];

        assert_eq!(
            verification_failure_message(&checks),
            "Seed verification failed for checks: workflow-levels, dataelement"
        );
    }

    #[test]
    fn verification_error_message_falls_back_to_generic_when_no_labels() {
        let checks = [("organisationunit", true), ("userinfo", true)];

        assert_eq!(verification_failure_message(&checks), "Some seed data failed to load");
    }

    #[test]
    fn summary_lists_seeded_users() {
        let seeded = SeedResult {
            workflow_uid: "WfMonthly01",
            period_iso: "202403",
            org_unit_uids: vec!["OuNational1"],
            usernames: vec!["admin", "clerk"],
        };

        let summary = render_seed_summary(&seeded);
        assert!(summary.starts_with("demo hierarchy loaded: workflow WfMonthly01 for period 202403"));
        assert!(summary.contains("users: admin, clerk"));
    }
}
