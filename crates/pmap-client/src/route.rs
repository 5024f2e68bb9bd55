use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Route {
    #[default]
    Map,
    Login,
    Register,
    /// Signed-in users only.
    Profile,
    NotFound,
}

impl Route {
    /// Query string, fragment and a trailing slash are ignored.
    pub fn from_path(path: &str) -> Self {
        let path = path.split(['?', '#']).next().unwrap_or("");
        let path = match path.trim_end_matches('/') {
            "" => "/",
            trimmed => trimmed,
        };

        match path {
            "/" => Self::Map,
            "/login" => Self::Login,
            "/register" => Self::Register,
            "/profile" => Self::Profile,
            _ => Self::NotFound,
        }
    }

    pub fn path(&self) -> &'static str {
        match self {
            Self::Map => "/",
            Self::Login => "/login",
            Self::Register => "/register",
            Self::Profile => "/profile",
            Self::NotFound => "/404",
        }
    }

    pub fn requires_auth(&self) -> bool {
        matches!(self, Self::Profile)
    }

    /// Pages a signed-in user has no reason to see.
    pub fn guest_only(&self) -> bool {
        matches!(self, Self::Login | Self::Register)
    }

    /// Where navigation to `path` actually lands.
    pub fn resolve(path: &str, signed_in: bool) -> Self {
        let route = Self::from_path(path);
        if route.requires_auth() && !signed_in {
            Self::Login
        } else if route.guest_only() && signed_in {
            Self::Map
        } else {
            route
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path())
    }
}
