use async_trait::async_trait;
use sqlx::Row;
use tracing::debug;

use signoff_core::approvals::{CellSignalRequest, CellSignalSource, CellSignals, HighestApproved};
use signoff_core::domain::org_unit::path_position_at_level;
use signoff_core::domain::period::medium_date_string;
use signoff_core::errors::ApplicationError;

use super::{decode_error, RepositoryError};
use crate::query::{apply_bindings, BindValue, NamedBindings};
use crate::DbPool;

/// Offset that keeps level ordinals fixed-width inside the packed
/// `highest_approved` column, so the textual minimum is the lowest ordinal.
const LEVEL_OFFSET: i64 = 100_000_000;

/// Computes per-cell approval signals with a single query.
#[derive(Clone)]
pub struct SqlCellSignalSource {
    pool: DbPool,
}

impl SqlCellSignalSource {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn fetch(
        &self,
        request: &CellSignalRequest,
    ) -> Result<Vec<CellSignals>, RepositoryError> {
        let (sql, values) = assemble_cell_signal_query(request);

        debug!(
            event_name = "approval.status.sql",
            bindings = values.len(),
            sql = %sql,
            "running approval cell query"
        );

        let rows = apply_bindings(sqlx::query(&sql), values).fetch_all(&self.pool).await?;
        rows.iter().map(row_to_cell_signals).collect()
    }
}

#[async_trait]
impl CellSignalSource for SqlCellSignalSource {
    async fn fetch_cell_signals(
        &self,
        request: &CellSignalRequest,
    ) -> Result<Vec<CellSignals>, ApplicationError> {
        Ok(self.fetch(request).await?)
    }
}

/// SQL and bind values computing, for every visible (org unit, attribute
/// option combo) cell, the highest approval recorded in the workflow period,
/// whether every org unit below is approved, and whether the cell is
/// approved at the level above.
///
/// Rows are grouped per cell: a cell is ready below only when every category
/// option of its combo is, and approved above when any is.
pub fn assemble_cell_signal_query(request: &CellSignalRequest) -> (String, Vec<BindValue>) {
    let mut bindings = NamedBindings::new();

    let workflow = bindings.bind("workflow", request.workflow_id);
    let start_date = bindings.bind("start_date", medium_date_string(request.start_date));
    let end_date = bindings.bind("end_date", medium_date_string(request.end_date));

    let workflow_sources = format!(
        "SELECT DISTINCT dss.sourceid FROM datasetsource dss \
         JOIN dataset ds ON ds.datasetid = dss.datasetid \
         WHERE ds.workflowid = {workflow}"
    );

    let highest_approved = highest_approved_subquery(&mut bindings, request, &workflow);
    let ready_below =
        ready_below_subquery(&mut bindings, request, &workflow, &end_date, &workflow_sources);
    let approved_above = approved_above_subquery(&mut bindings, request, &workflow, &end_date);

    let combo_join = match request.attribute_combo_id {
        Some(combo_id) => format!(
            "JOIN categorycombos_optioncombos ccoc \
             ON ccoc.categoryoptioncomboid = cocco.categoryoptioncomboid \
             AND ccoc.categorycomboid = {} ",
            bindings.bind("attribute_combo", combo_id)
        ),
        None => String::new(),
    };

    let org_unit_filter = match &request.org_unit_ids {
        Some(ids) => format!(
            "o.organisationunitid IN ({})",
            bindings.bind_list("org_units", ids.iter().copied())
        ),
        None => {
            let level = bindings.bind("org_unit_level", request.org_unit_level);
            let mut filter = format!("o.hierarchylevel = {level}");
            if !request.super_user && !request.user_org_unit_uids.is_empty() {
                let subtrees = request
                    .user_org_unit_uids
                    .iter()
                    .enumerate()
                    .map(|(index, uid)| {
                        let uid = bindings.bind(&format!("user_org_units[{index}]"), uid.as_str());
                        format!("instr(o.path, {uid}) <> 0")
                    })
                    .collect::<Vec<_>>()
                    .join(" OR ");
                filter.push_str(&format!(" AND ({subtrees})"));
            }
            filter
        }
    };

    let option_combo_filter = if request.attribute_option_combo_ids.is_empty() {
        String::new()
    } else {
        format!(
            " AND cocco.categoryoptioncomboid IN ({})",
            bindings.bind_list(
                "attribute_option_combos",
                request.attribute_option_combo_ids.iter().copied()
            )
        )
    };

    let sharing_filter = if request.super_user {
        String::new()
    } else {
        let user = bindings.bind("user", request.user_id);
        format!(
            " AND (co.publicaccess IS NULL OR substr(co.publicaccess, 1, 1) = 'r' \
             OR co.userid IS NULL OR co.userid = {user} \
             OR EXISTS (SELECT 1 FROM dataelementcategoryoptionusergroupaccesses couga \
                 JOIN usergroupaccess uga ON uga.usergroupaccessid = couga.usergroupaccessid \
                 JOIN usergroupmembers ugm ON ugm.usergroupid = uga.usergroupid \
                 WHERE couga.categoryoptionid = cocco.categoryoptionid \
                 AND substr(uga.access, 1, 1) = 'r' AND ugm.userid = {user}))"
        )
    };

    let cells = format!(
        "SELECT coc.uid AS cocuid, o.uid AS ouuid, o.name AS ouname, \
         {highest_approved} AS highest_approved, \
         {ready_below} AS ready_below, \
         {approved_above} AS approved_above \
         FROM categoryoptioncombo coc \
         JOIN categoryoptioncombos_categoryoptions cocco \
             ON cocco.categoryoptioncomboid = coc.categoryoptioncomboid \
         {combo_join}\
         JOIN dataelementcategoryoption co ON co.categoryoptionid = cocco.categoryoptionid \
             AND (co.startdate IS NULL OR co.startdate <= {end_date}) \
             AND (co.enddate IS NULL OR co.enddate >= {start_date}) \
         JOIN organisationunit o ON {org_unit_filter} \
         LEFT JOIN categoryoption_organisationunits coo \
             ON coo.categoryoptionid = co.categoryoptionid \
         LEFT JOIN organisationunit oc ON oc.organisationunitid = coo.organisationunitid \
         WHERE (coo.categoryoptionid IS NULL \
             OR instr(oc.path, o.uid) <> 0 \
             OR instr(o.path, oc.uid) <> 0)\
         {option_combo_filter}\
         {sharing_filter} \
         AND EXISTS (SELECT 1 FROM organisationunit od \
             WHERE substr(od.path, 1, length(o.path)) = o.path \
             AND od.organisationunitid IN ({workflow_sources}))"
    );

    let sql = format!(
        "SELECT cocuid, ouuid, ouname, \
         MIN(highest_approved) AS highest_approved, \
         MIN(ready_below) AS ready_below, \
         MAX(approved_above) AS approved_above \
         FROM ({cells}) cells \
         GROUP BY cocuid, ouuid, ouname \
         ORDER BY ouuid, cocuid"
    );

    (sql, bindings.into_values())
}

fn highest_approved_subquery(
    bindings: &mut NamedBindings,
    request: &CellSignalRequest,
    workflow: &str,
) -> String {
    let workflow_period = bindings.bind("workflow_period", request.workflow_period_id);

    let (org_unit_join, org_unit_compare) = match request.org_unit_ids {
        Some(_) => (String::new(), "da.organisationunitid = o.organisationunitid".to_owned()),
        None => (
            "JOIN organisationunit dao ON dao.organisationunitid = da.organisationunitid "
                .to_owned(),
            "instr(o.path, dao.uid) <> 0".to_owned(),
        ),
    };

    let level_restriction = match &request.user_level_ids {
        Some(ids) => format!(
            " AND dal.dataapprovallevelid IN ({})",
            bindings.bind_list("user_levels", ids.iter().copied())
        ),
        None => String::new(),
    };

    format!(
        "(SELECT MIN(({LEVEL_OFFSET} + dal.level) || '-' || da.accepted || '-' || da.organisationunitid) \
         FROM dataapproval da \
         JOIN dataapprovallevel dal ON dal.dataapprovallevelid = da.dataapprovallevelid \
         {org_unit_join}\
         WHERE da.workflowid = {workflow} \
         AND da.periodid = {workflow_period} \
         AND da.attributeoptioncomboid = cocco.categoryoptioncomboid \
         AND {org_unit_compare}{level_restriction})"
    )
}

fn ready_below_subquery(
    bindings: &mut NamedBindings,
    request: &CellSignalRequest,
    workflow: &str,
    end_date: &str,
    workflow_sources: &str,
) -> String {
    let Some(below) = &request.level_below else {
        return "1".to_owned();
    };

    let below_level = bindings.bind("below_level", below.id);
    let below_org_unit_level = bindings.bind("below_org_unit_level", below.org_unit_level);
    let org_unit_position =
        bindings.bind("org_unit_position", path_position_at_level(request.org_unit_level));
    let accepted = if request.acceptance_required { " AND da.accepted = 1" } else { "" };

    let option_org_units = if request.default_combo {
        String::new()
    } else {
        let below_position =
            bindings.bind("below_position", path_position_at_level(below.org_unit_level));
        format!(
            " AND (NOT EXISTS (SELECT 1 FROM categoryoption_organisationunits c_o \
                 WHERE c_o.categoryoptionid = cocco.categoryoptionid) \
             OR EXISTS (SELECT 1 FROM categoryoption_organisationunits c_o \
                 JOIN organisationunit o2 ON o2.organisationunitid = c_o.organisationunitid \
                 WHERE c_o.categoryoptionid = cocco.categoryoptionid \
                 AND instr(dao.path, o2.uid) BETWEEN 2 AND {below_position}))"
        )
    };

    format!(
        "NOT EXISTS (SELECT 1 FROM organisationunit dao \
         WHERE EXISTS (SELECT 1 FROM organisationunit child \
             WHERE instr(child.path, dao.uid) <> 0 \
             AND child.organisationunitid IN ({workflow_sources})) \
         AND NOT EXISTS (SELECT 1 FROM dataapproval da \
             JOIN period p ON p.periodid = da.periodid \
             WHERE da.organisationunitid = dao.organisationunitid \
             AND da.dataapprovallevelid = {below_level} \
             AND {end_date} >= p.startdate AND {end_date} <= p.enddate \
             AND da.workflowid = {workflow} \
             AND da.attributeoptioncomboid = cocco.categoryoptioncomboid{accepted}) \
         AND instr(dao.path, o.uid) = {org_unit_position} \
         AND dao.hierarchylevel = {below_org_unit_level}{option_org_units})"
    )
}

fn approved_above_subquery(
    bindings: &mut NamedBindings,
    request: &CellSignalRequest,
    workflow: &str,
    end_date: &str,
) -> String {
    let Some(above) = &request.approved_above_level else {
        return "0".to_owned();
    };

    let above_level = bindings.bind("approved_above_level", above.id);
    let above_position =
        bindings.bind("approved_above_position", path_position_at_level(above.org_unit_level));

    format!(
        "EXISTS (SELECT 1 FROM dataapproval da \
         JOIN period p ON p.periodid = da.periodid \
         JOIN organisationunit dao ON dao.organisationunitid = da.organisationunitid \
         WHERE instr(o.path, dao.uid) = {above_position} \
         AND {end_date} >= p.startdate AND {end_date} <= p.enddate \
         AND da.dataapprovallevelid = {above_level} \
         AND da.workflowid = {workflow} \
         AND da.attributeoptioncomboid = cocco.categoryoptioncomboid)"
    )
}

fn row_to_cell_signals(row: &sqlx::sqlite::SqliteRow) -> Result<CellSignals, RepositoryError> {
    let attribute_option_combo_uid: String = row.try_get("cocuid").map_err(decode_error)?;
    let org_unit_uid: Option<String> = row.try_get("ouuid").map_err(decode_error)?;
    let org_unit_name: Option<String> = row.try_get("ouname").map_err(decode_error)?;
    let highest_approved: Option<String> = row.try_get("highest_approved").map_err(decode_error)?;
    let ready_below: i64 = row.try_get("ready_below").map_err(decode_error)?;
    let approved_above: i64 = row.try_get("approved_above").map_err(decode_error)?;

    Ok(CellSignals {
        attribute_option_combo_uid,
        org_unit_uid,
        org_unit_name,
        highest_approved: highest_approved.as_deref().map(parse_highest_approved).transpose()?,
        ready_below: ready_below != 0,
        approved_above: approved_above != 0,
    })
}

/// Parses `<offset + level>-<accepted>-<org unit id>`.
pub fn parse_highest_approved(packed: &str) -> Result<HighestApproved, RepositoryError> {
    let malformed = || RepositoryError::Decode(format!("malformed highest approval `{packed}`"));

    let mut parts = packed.split('-');
    let (Some(level), Some(accepted), Some(org_unit_id), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(malformed());
    };

    let level = level.parse::<i64>().map_err(|_| malformed())? - LEVEL_OFFSET;
    let level = u32::try_from(level).map_err(|_| malformed())?;
    let accepted = match accepted {
        "1" => true,
        "0" => false,
        _ => return Err(malformed()),
    };
    let org_unit_id = org_unit_id.parse::<i64>().map_err(|_| malformed())?;

    Ok(HighestApproved { level, accepted, org_unit_id })
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use signoff_core::approvals::{CellSignalRequest, HighestApproved};
    use signoff_core::domain::approval::ApprovalLevel;

    use super::{assemble_cell_signal_query, parse_highest_approved};
    use crate::query::BindValue;

    fn level(id: i64, level: u32) -> ApprovalLevel {
        ApprovalLevel {
            id,
            uid: format!("Lvl{level:08}"),
            name: format!("Level {level}"),
            level,
            org_unit_level: level,
        }
    }

    fn request() -> CellSignalRequest {
        CellSignalRequest {
            workflow_id: 1,
            workflow_period_id: Some(5),
            start_date: NaiveDate::from_ymd_opt(2024, 3, 1).expect("date"),
            end_date: NaiveDate::from_ymd_opt(2024, 3, 31).expect("date"),
            org_unit_ids: None,
            org_unit_level: 2,
            attribute_combo_id: None,
            attribute_option_combo_ids: Vec::new(),
            default_combo: false,
            user_id: 9,
            super_user: false,
            user_org_unit_uids: vec!["OuNational1".to_owned()],
            user_level_ids: None,
            approved_above_level: Some(level(1, 1)),
            level_below: Some(level(3, 3)),
            acceptance_required: true,
        }
    }

    #[test]
    fn shared_values_are_bound_once() {
        let (sql, values) = assemble_cell_signal_query(&request());

        let end_dates = values
            .iter()
            .filter(|value| **value == BindValue::Text("2024-03-31".to_owned()))
            .count();
        assert_eq!(end_dates, 1);
        assert_eq!(values.iter().filter(|value| **value == BindValue::Int(9)).count(), 1);
        assert!(sql.matches("?3").count() > 1, "end date placeholder should be reused");
    }

    #[test]
    fn values_never_appear_in_sql_text() {
        let (sql, _) = assemble_cell_signal_query(&request());

        assert!(!sql.contains("2024-03-31"));
        assert!(!sql.contains("OuNational1"));
        assert!(sql.contains("da.accepted = 1"));
    }

    #[test]
    fn optional_subqueries_collapse_to_constants() {
        let mut request = request();
        request.approved_above_level = None;
        request.level_below = None;
        request.super_user = true;
        request.user_org_unit_uids.clear();

        let (sql, values) = assemble_cell_signal_query(&request);

        assert!(sql.contains("1 AS ready_below"));
        assert!(sql.contains("0 AS approved_above"));
        assert!(!sql.contains("publicaccess"));
        assert!(!values.contains(&BindValue::Int(9)));
    }

    #[test]
    fn requested_org_units_replace_level_filter() {
        let mut request = request();
        request.org_unit_ids = Some(vec![21, 22]);
        request.attribute_option_combo_ids = vec![40];
        request.user_level_ids = Some(vec![2, 3]);

        let (sql, values) = assemble_cell_signal_query(&request);

        assert!(sql.contains("o.organisationunitid IN (?"));
        assert!(sql.contains("cocco.categoryoptioncomboid IN (?"));
        assert!(sql.contains("dal.dataapprovallevelid IN (?"));
        assert!(!sql.contains("o.hierarchylevel ="));
        for id in [21, 22, 40] {
            assert!(values.contains(&BindValue::Int(id)));
        }
    }

    #[test]
    fn missing_workflow_period_binds_null() {
        let mut request = request();
        request.workflow_period_id = None;

        let (_, values) = assemble_cell_signal_query(&request);

        assert!(values.contains(&BindValue::Null));
    }

    #[test]
    fn packed_highest_approval_parses() {
        assert_eq!(
            parse_highest_approved("100000002-1-42").expect("parse"),
            HighestApproved { level: 2, accepted: true, org_unit_id: 42 }
        );
        assert!(parse_highest_approved("100000002-1").is_err());
        assert!(parse_highest_approved("2-0-42").is_err());
        assert!(parse_highest_approved("100000002-t-42").is_err());
    }
}
