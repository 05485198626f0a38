use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub const REQUIRED_MESSAGE: &str = "This field is required";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Field {
    Client,
    Country,
    ServiceDescription,
    AwsServiceToImplement,
    CurrentMethod,
    NewSystemMethod,
    SuccessCriteria,
}

impl Field {
    /// Display order.
    pub const ALL: [Field; 7] = [
        Self::Client,
        Self::Country,
        Self::ServiceDescription,
        Self::AwsServiceToImplement,
        Self::CurrentMethod,
        Self::NewSystemMethod,
        Self::SuccessCriteria,
    ];

    /// Form control name, also the key in the invocation parameters.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Client => "client",
            Self::Country => "country",
            Self::ServiceDescription => "serviceDescription",
            Self::AwsServiceToImplement => "awsServiceToImplement",
            Self::CurrentMethod => "currentMethod",
            Self::NewSystemMethod => "newSystemMethod",
            Self::SuccessCriteria => "successCriteria",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Client => "Who is the client?",
            Self::Country => "Which country?",
            Self::ServiceDescription => "Service description",
            Self::AwsServiceToImplement => "AWS service to implement",
            Self::CurrentMethod => "How does the client do it today?",
            Self::NewSystemMethod => "How would it work with the new system?",
            Self::SuccessCriteria => "What is the success criterion?",
        }
    }

    pub fn multiline(&self) -> bool {
        !matches!(self, Self::Client | Self::Country)
    }
}

/// Field state as typed so far. Absent fields decode as empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FormValues {
    pub client: String,
    pub country: String,
    pub service_description: String,
    pub aws_service_to_implement: String,
    pub current_method: String,
    pub new_system_method: String,
    pub success_criteria: String,
}

impl FormValues {
    pub fn get(&self, field: Field) -> &str {
        match field {
            Field::Client => &self.client,
            Field::Country => &self.country,
            Field::ServiceDescription => &self.service_description,
            Field::AwsServiceToImplement => &self.aws_service_to_implement,
            Field::CurrentMethod => &self.current_method,
            Field::NewSystemMethod => &self.new_system_method,
            Field::SuccessCriteria => &self.success_criteria,
        }
    }

    pub fn set(&mut self, field: Field, value: impl Into<String>) {
        let slot = match field {
            Field::Client => &mut self.client,
            Field::Country => &mut self.country,
            Field::ServiceDescription => &mut self.service_description,
            Field::AwsServiceToImplement => &mut self.aws_service_to_implement,
            Field::CurrentMethod => &mut self.current_method,
            Field::NewSystemMethod => &mut self.new_system_method,
            Field::SuccessCriteria => &mut self.success_criteria,
        };
        *slot = value.into();
    }

    /// Checks every field and freezes the values on success.
    pub fn validate(&self) -> Result<SubmissionRequest, FieldErrors> {
        let mut errors = FieldErrors::default();
        for field in Field::ALL {
            if self.get(field).is_empty() {
                errors.insert(field, REQUIRED_MESSAGE);
            }
        }

        if !errors.is_empty() {
            return Err(errors);
        }

        Ok(SubmissionRequest {
            client: self.client.clone(),
            country: self.country.clone(),
            service_description: self.service_description.clone(),
            aws_service_to_implement: self.aws_service_to_implement.clone(),
            current_method: self.current_method.clone(),
            new_system_method: self.new_system_method.clone(),
            success_criteria: self.success_criteria.clone(),
        })
    }
}

/// A validated submission. Serializes as the invocation `parameters` object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionRequest {
    client: String,
    country: String,
    service_description: String,
    aws_service_to_implement: String,
    current_method: String,
    new_system_method: String,
    success_criteria: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldErrors {
    errors: BTreeMap<Field, &'static str>,
}

impl FieldErrors {
    fn insert(&mut self, field: Field, message: &'static str) {
        self.errors.insert(field, message);
    }

    pub fn message(&self, field: Field) -> Option<&'static str> {
        self.errors.get(&field).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn fields(&self) -> impl Iterator<Item = Field> + '_ {
        self.errors.keys().copied()
    }
}

#[cfg(test)]
pub(crate) fn filled_values() -> FormValues {
    let mut values = FormValues::default();
    for field in Field::ALL {
        values.set(field, format!("{} value", field.name()));
    }
    values
}
