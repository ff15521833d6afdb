/// What a consumer of an orchestrated fetch can observe.
///
/// Exactly one variant is visible at any time. `Initial` means nothing has
/// settled yet (or the state was flushed), so consumers show a loading
/// indicator instead of stale data.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FetchState<T, E> {
    #[default]
    Initial,
    Ok(T),
    Err(E),
}

impl<T, E> FetchState<T, E> {
    pub fn is_initial(&self) -> bool {
        matches!(self, FetchState::Initial)
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, FetchState::Ok(_))
    }

    pub fn is_err(&self) -> bool {
        matches!(self, FetchState::Err(_))
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            FetchState::Ok(value) => Some(value),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&E> {
        match self {
            FetchState::Err(error) => Some(error),
            _ => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> FetchState<U, E> {
        match self {
            FetchState::Initial => FetchState::Initial,
            FetchState::Ok(value) => FetchState::Ok(f(value)),
            FetchState::Err(error) => FetchState::Err(error),
        }
    }
}
