// src/services/workflow.rs

use crate::{
    common::error::AppError,
    models::crm::{CustomerStatus, TransitionSource},
};

use CustomerStatus::*;

/// Destinos permitidos a partir de `from`, por origem da transição.
///
/// O caminho do operador é consultivo: qualquer estado pode ser definido
/// manualmente. O pipeline de IA só anda pelas arestas abaixo (incluindo o
/// retorno explícito de `AiAnalyzing` quando a análise falha).
pub fn allowed_targets(from: CustomerStatus, source: TransitionSource) -> Vec<CustomerStatus> {
    match source {
        TransitionSource::Operator => CustomerStatus::ALL
            .into_iter()
            .filter(|s| *s != from)
            .collect(),
        TransitionSource::Pipeline => match from {
            PendingIntake => vec![AiAnalyzing],
            AiAnalyzing => vec![ProposalReady, PendingIntake, FollowingUp],
            ProposalReady => vec![AiAnalyzing, FollowingUp],
            FollowingUp => vec![AiAnalyzing, Signed],
            Signed => vec![],
        },
    }
}

/// Verifica a transição. Não toca no banco; quem persiste é o CrmService.
pub fn check_transition(
    from: CustomerStatus,
    to: CustomerStatus,
    source: TransitionSource,
) -> Result<(), AppError> {
    if allowed_targets(from, source).contains(&to) {
        Ok(())
    } else {
        Err(AppError::InvalidTransition { from, to, via: source })
    }
}
