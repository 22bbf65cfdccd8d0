use super::{Variable, VariableError, VariableInfo};

/// Internal registration structure used by the macro.
#[doc(hidden)]
pub struct VariableRegistration {
    pub info: VariableInfo,
    pub schemes: &'static [&'static str],
    pub factory: fn(&url::Url) -> Result<Box<dyn Variable>, VariableError>,
}

/// Distributed slice that collects all variable provider registrations.
#[doc(hidden)]
#[linkme::distributed_slice]
pub static VARIABLE_REGISTRY: [VariableRegistration];

/// Declarative macro for registering variable providers.
///
/// The config type must implement `TryFrom<&Url, Error = VariableError>` and
/// the provider type must offer `new(config)` and implement [`Variable`].
///
/// # Usage
///
/// ```ignore
/// register_variable! {
///     struct: ConstantVariable,
///     config: ConstantConfig,
///     name: "constant",
///     description: "Fixed value embedded in the URL",
///     schemes: ["constant"],
///     examples: ["constant://?val=hello&decoder=string"],
/// }
/// ```
#[doc(hidden)]
#[macro_export]
macro_rules! register_variable {
    (
        struct: $struct_name:ident,
        config: $config_type:ty,
        name: $name:expr,
        description: $description:expr,
        schemes: [$($scheme:expr),* $(,)?],
        examples: [$($example:expr),* $(,)?] $(,)?
    ) => {
        impl $struct_name {
            #[allow(dead_code)]
            const PROVIDER_NAME: &'static str = $name;
        }

        const _: () = {
            #[linkme::distributed_slice($crate::variable::VARIABLE_REGISTRY)]
            #[doc(hidden)]
            static VARIABLE_REGISTRATION: $crate::variable::VariableRegistration = $crate::variable::VariableRegistration {
                info: $crate::variable::VariableInfo {
                    name: $name,
                    description: $description,
                    examples: &[$($example,)*],
                },
                schemes: &[$($scheme,)*],
                factory: |url| {
                    let config = <$config_type>::try_from(url)?;
                    Ok(Box::new(<$struct_name>::new(config)))
                },
            };
        };
    };
}
