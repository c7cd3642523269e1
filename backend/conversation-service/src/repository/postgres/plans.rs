use async_trait::async_trait;
use uuid::Uuid;

use super::PgStore;
use crate::models::Plan;
use crate::repository::{PlanDirectory, StoreResult};

#[async_trait]
impl PlanDirectory for PgStore {
    async fn plan_for(&self, user_id: Uuid) -> StoreResult<Plan> {
        let client = self.client().await?;
        let row = client
            .query_opt("SELECT plan FROM user_plans WHERE user_id = $1", &[&user_id])
            .await?;
        Ok(row
            .map(|r| Plan::normalize(&r.get::<_, String>("plan")))
            .unwrap_or(Plan::Free))
    }

    async fn set_plan(&self, user_id: Uuid, plan: Plan) -> StoreResult<()> {
        let client = self.client().await?;
        client
            .execute(
                r#"
                INSERT INTO user_plans (user_id, plan, updated_at)
                VALUES ($1, $2, NOW())
                ON CONFLICT (user_id) DO UPDATE SET plan = EXCLUDED.plan, updated_at = NOW()
                "#,
                &[&user_id, &plan.as_str()],
            )
            .await?;
        Ok(())
    }
}
