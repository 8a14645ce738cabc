use seed_node_pipeline::SeedNodeApi;

#[derive(Clone)]
pub struct AppState {
    pub api: SeedNodeApi,
}
