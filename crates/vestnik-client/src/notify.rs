//! The uniform user-facing notice contract.
//!
//! Every command failure maps onto exactly one [`Notice`] by fault
//! class, so no flow is left silently stale: validation faults echo the
//! reason, transient faults ask the user to retry, conflicts say the
//! record changed elsewhere.

use serde::Serialize;

use vestnik_shared::{Fault, FaultKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

/// A toast-sized message for the embedding shell.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
    /// Whether offering a "retry" affordance makes sense.
    pub retryable: bool,
}

/// Build the notice for a failed command.
pub fn notice_for<E>(error: &E) -> Notice
where
    E: Fault + std::fmt::Display,
{
    match error.kind() {
        FaultKind::Validation => Notice {
            level: NoticeLevel::Warning,
            message: error.to_string(),
            retryable: false,
        },
        FaultKind::NotFound => Notice {
            level: NoticeLevel::Warning,
            message: "Запись не найдена — возможно, она была удалена.".to_string(),
            retryable: false,
        },
        FaultKind::Conflict => Notice {
            level: NoticeLevel::Warning,
            message: "Данные изменились в другом окне. Обновите страницу и попробуйте ещё раз."
                .to_string(),
            retryable: true,
        },
        FaultKind::TransientRemote => Notice {
            level: NoticeLevel::Error,
            message: "Сервис временно недоступен. Попробуйте ещё раз.".to_string(),
            retryable: true,
        },
        FaultKind::PermanentRemote => Notice {
            level: NoticeLevel::Error,
            message: "Запрос отклонён сервером. Если ошибка повторяется, обратитесь в поддержку."
                .to_string(),
            retryable: false,
        },
    }
}
