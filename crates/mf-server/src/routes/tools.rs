//! External tool status.

use axum::extract::State;
use axum::Json;

use crate::context::AppContext;
use crate::error::AppError;

/// GET /api/tools
pub async fn tools(State(ctx): State<AppContext>) -> Result<Json<Vec<mf_av::ToolInfo>>, AppError> {
    let tools = ctx.tools.clone();
    // check_all runs each tool's --version synchronously.
    let infos = tokio::task::spawn_blocking(move || tools.check_all())
        .await
        .map_err(|e| mf_core::Error::Internal(format!("tool check failed: {e}")))?;
    Ok(Json(infos))
}
