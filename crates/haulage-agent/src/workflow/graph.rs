use haulage_core::types::Stage;

/// Static dependency edges, `(from, to)`: `to` runs only after `from`
/// completes.
pub const EDGES: [(Stage, Stage); 3] = [
    (Stage::Compliance, Stage::Shipment),
    (Stage::Compliance, Stage::Warehouse),
    (Stage::Shipment, Stage::Maintenance),
];

/// Stages that must complete before `stage` may run.
pub fn predecessors(stage: Stage) -> Vec<Stage> {
    EDGES
        .iter()
        .filter(|(_, to)| *to == stage)
        .map(|(from, _)| *from)
        .collect()
}

/// Stages that directly wait on `stage`.
pub fn dependents(stage: Stage) -> Vec<Stage> {
    EDGES
        .iter()
        .filter(|(from, _)| *from == stage)
        .map(|(_, to)| *to)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_predecessors() {
        assert!(predecessors(Stage::Compliance).is_empty());
        assert_eq!(predecessors(Stage::Shipment), vec![Stage::Compliance]);
        assert_eq!(predecessors(Stage::Warehouse), vec![Stage::Compliance]);
        assert_eq!(predecessors(Stage::Maintenance), vec![Stage::Shipment]);
    }

    #[test]
    fn test_dependents() {
        assert_eq!(
            dependents(Stage::Compliance),
            vec![Stage::Shipment, Stage::Warehouse]
        );
        assert_eq!(dependents(Stage::Shipment), vec![Stage::Maintenance]);
        assert!(dependents(Stage::Warehouse).is_empty());
        assert!(dependents(Stage::Maintenance).is_empty());
    }

    #[test]
    fn test_stage_order_is_topological() {
        let position = |s: Stage| Stage::ALL.iter().position(|x| *x == s).unwrap();
        for (from, to) in EDGES {
            assert!(position(from) < position(to));
        }
    }
}
