//! Classification of a method's parameters by role.

use std::collections::HashSet;

use crate::descriptor::{ParamDescriptor, ParamRole};
use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterPlan {
    params: Vec<ParamDescriptor>,
    body: Option<usize>,
}

impl ParameterPlan {
    /// Keeps declaration order. Rejects a second body parameter and repeated
    /// binding keys within one role.
    pub fn classify(params: &[ParamDescriptor]) -> Result<Self> {
        let mut body = None;
        let mut seen = HashSet::new();

        for (index, param) in params.iter().enumerate() {
            match param.role {
                ParamRole::Body => {
                    if body.is_some() {
                        return Err(Error::Configuration(format!(
                            "more than one body parameter (second is {})",
                            param.key
                        )));
                    }
                    body = Some(index);
                }
                ParamRole::Unbound => {}
                role => {
                    if !seen.insert((role, param.key.as_str())) {
                        return Err(Error::Configuration(format!(
                            "parameter key {} is bound twice as {:?}",
                            param.key, role
                        )));
                    }
                }
            }
        }

        Ok(Self {
            params: params.to_vec(),
            body,
        })
    }

    pub fn params(&self) -> &[ParamDescriptor] {
        &self.params
    }

    pub fn body(&self) -> Option<&ParamDescriptor> {
        self.body.map(|i| &self.params[i])
    }

    pub fn keys(&self, role: ParamRole) -> impl Iterator<Item = &str> {
        self.params
            .iter()
            .filter(move |p| p.role == role)
            .map(|p| p.key.as_str())
    }

    /// Binding keys that end up in the request, body excluded.
    pub fn bound_keys(&self) -> impl Iterator<Item = &str> {
        self.params
            .iter()
            .filter(|p| !matches!(p.role, ParamRole::Body | ParamRole::Unbound))
            .map(|p| p.key.as_str())
    }
}
