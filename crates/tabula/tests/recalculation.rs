//! Dependency tracking, cycles and update batches

use pretty_assertions::assert_eq;
use tabula::prelude::*;

#[test]
fn test_mutual_references_are_circular() {
    let mut wb = Workbook::new();
    let mut sheet = wb.sheet_mut(0).unwrap();
    sheet.set_input("A1", "=A2+1").unwrap();
    sheet.set_input("A2", "=A1+1").unwrap();

    assert_eq!(sheet.value("A1").unwrap(), CellData::Error(CellError::Circular));
    assert_eq!(sheet.value("A2").unwrap(), CellData::Error(CellError::Circular));

    // Repeated passes terminate and agree
    let stats = wb.recalculate_all();
    assert_eq!(stats.circular_references, 2);
    assert_eq!(stats.cells_calculated, 0);
    assert_eq!(wb.value(0, 0, 0).unwrap(), CellData::Error(CellError::Circular));
}

#[test]
fn test_long_cycle_across_sheets() {
    let mut wb = Workbook::new();
    let other = wb.add_sheet("Other").unwrap();
    wb.set_input(0, 0, 0, "=Other!A1").unwrap();
    wb.set_input(other, 0, 0, "=Sheet1!A2").unwrap();
    wb.set_input(0, 1, 0, "=Sheet1!A3").unwrap();
    wb.set_input(0, 2, 0, "=A1").unwrap();
    wb.set_input(0, 3, 0, "=A1&\"!\"").unwrap();

    for (sheet, row) in [(0, 0), (other, 0), (0, 1), (0, 2)] {
        assert_eq!(wb.value(sheet, row, 0).unwrap(), CellData::Error(CellError::Circular));
    }
    // Downstream of the cycle, but not part of it
    assert_eq!(wb.value(0, 3, 0).unwrap(), CellData::Error(CellError::Circular));

    wb.set_input(0, 2, 0, "7").unwrap();
    assert_eq!(wb.value(0, 0, 0).unwrap(), CellData::Number(7.0));
    assert_eq!(wb.value(0, 3, 0).unwrap(), CellData::text("7!"));
}

#[test]
fn test_diamond_evaluates_each_cell_once() {
    let mut wb = Workbook::new();
    let mut sheet = wb.sheet_mut(0).unwrap();
    sheet.set_input("A1", "1").unwrap();
    sheet.set_input("B1", "=A1*2").unwrap();
    sheet.set_input("C1", "=A1*3").unwrap();
    sheet.set_input("D1", "=B1+C1").unwrap();
    assert_eq!(sheet.value("D1").unwrap(), CellData::Number(5.0));

    sheet.begin_update().unwrap();
    sheet.set_input("A1", "10").unwrap();
    let stats = sheet.end_update().unwrap();
    assert_eq!(stats.cells_calculated, 3);
    assert_eq!(sheet.value("D1").unwrap(), CellData::Number(50.0));
}

#[test]
fn test_nested_batch_is_rejected() {
    let mut wb = Workbook::new();
    let mut sheet = wb.sheet_mut(0).unwrap();
    sheet.begin_update().unwrap();
    assert!(matches!(sheet.begin_update(), Err(Error::BatchInProgress(_))));
    assert!(sheet.is_updating());
    sheet.end_update().unwrap();
    assert!(!sheet.is_updating());
    sheet.begin_update().unwrap();
}

#[test]
fn test_batch_guard_recalculates_on_drop() {
    let mut wb = Workbook::new();
    wb.set_input(0, 0, 1, "=SUM(A1:A100)").unwrap();
    {
        let mut batch = wb.batch(0).unwrap();
        for row in 0..100 {
            batch.set_input(0, row, 0, "1").unwrap();
        }
        assert_eq!(batch.value(0, 0, 1).unwrap(), CellData::Number(0.0));
    }
    assert_eq!(wb.value(0, 0, 1).unwrap(), CellData::Number(100.0));
}

#[test]
fn test_volatile_functions_refresh() {
    let mut wb = Workbook::new();
    let mut sheet = wb.sheet_mut(0).unwrap();
    sheet.set_input("A1", "=RANDBETWEEN(1,6)").unwrap();
    sheet.set_input("B1", "=A1>=1").unwrap();
    sheet.set_input("C1", "unrelated").unwrap();
    assert_eq!(sheet.value("B1").unwrap(), CellData::Boolean(true));

    let stats = wb.recalculate_all();
    assert_eq!(stats.volatile_cells, 1);
    assert_eq!(stats.formula_count, 2);
}
