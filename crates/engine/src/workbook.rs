use serde::{Deserialize, Serialize};

use crate::sheet::{is_valid_sheet_name, Sheet};

/// An ordered collection of sheets
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Workbook {
    sheets: Vec<Sheet>,
}

impl Workbook {
    /// Create an empty workbook (no sheets)
    pub fn new() -> Self {
        Self { sheets: Vec::new() }
    }

    /// Create a workbook from sheets (used by the importer)
    pub fn from_sheets(sheets: Vec<Sheet>) -> Self {
        Self { sheets }
    }

    pub fn sheet_count(&self) -> usize {
        self.sheets.len()
    }

    pub fn sheet(&self, index: usize) -> Option<&Sheet> {
        self.sheets.get(index)
    }

    pub fn sheet_mut(&mut self, index: usize) -> Option<&mut Sheet> {
        self.sheets.get_mut(index)
    }

    pub fn sheets(&self) -> &[Sheet] {
        &self.sheets
    }

    pub fn sheet_names(&self) -> Vec<&str> {
        self.sheets.iter().map(|s| s.name.as_str()).collect()
    }

    /// Index of the sheet with exactly this name
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.sheets.iter().position(|s| s.name == name)
    }

    pub fn sheet_by_name(&self, name: &str) -> Option<&Sheet> {
        self.sheets.iter().find(|s| s.name == name)
    }

    pub fn sheet_by_name_mut(&mut self, name: &str) -> Option<&mut Sheet> {
        self.sheets.iter_mut().find(|s| s.name == name)
    }

    /// Check if a sheet name already exists (case-insensitive, as Excel compares them)
    pub fn sheet_name_exists(&self, name: &str) -> bool {
        let key = name.to_lowercase();
        self.sheets.iter().any(|s| s.name.to_lowercase() == key)
    }

    /// Append a new empty sheet.
    /// Returns None if the name is invalid or already taken.
    pub fn add_sheet_named(&mut self, name: &str) -> Option<usize> {
        if !is_valid_sheet_name(name) || self.sheet_name_exists(name) {
            return None;
        }
        self.sheets.push(Sheet::new(name));
        Some(self.sheets.len() - 1)
    }

    /// Delete a sheet by index.
    /// Returns false if it's the last sheet (a workbook keeps at least one).
    pub fn delete_sheet(&mut self, index: usize) -> bool {
        if self.sheets.len() <= 1 || index >= self.sheets.len() {
            return false;
        }
        self.sheets.remove(index);
        true
    }
}
