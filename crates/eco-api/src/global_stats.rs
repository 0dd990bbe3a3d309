use axum::Json;
use serde::Serialize;

#[derive(Serialize)]
pub(crate) struct GlobalStat {
    pub data_type: &'static str,
    pub value: u64,
}

/// External reference figures for the frontend's comparison widgets.
/// TODO: source these from the FAO / Global E-waste Monitor feeds instead
/// of shipping the static yearly figures.
pub(crate) async fn get_global_stats() -> Json<Vec<GlobalStat>> {
    Json(vec![
        GlobalStat {
            data_type: "food_waste",
            value: 1_300_000_000,
        },
        GlobalStat {
            data_type: "hunger_deaths",
            value: 9_000_000,
        },
        GlobalStat {
            data_type: "ewaste_pollution",
            value: 53_600_000,
        },
    ])
}
