//! Insert/delete, sort, filter and paste through the public API

use pretty_assertions::assert_eq;
use tabula::prelude::*;

#[test]
fn test_sort_moves_formula_text_verbatim() {
    let mut wb = Workbook::new();
    let mut sheet = wb.sheet_mut(0).unwrap();
    sheet.set_input("A1", "2").unwrap();
    sheet.set_input("A2", "=A1+1").unwrap();
    sheet.set_input("A3", "1").unwrap();

    sheet
        .sort(RangeRef::parse("A1:A3").unwrap(), SortOrder::Ascending, 0, false)
        .unwrap();

    assert_eq!(sheet.value("A1").unwrap(), CellData::Number(1.0));
    assert_eq!(sheet.value("A2").unwrap(), CellData::Number(2.0));
    assert_eq!(sheet.formula("A3").unwrap(), Some("=A1+1"));
    assert_eq!(sheet.value("A3").unwrap(), CellData::Number(2.0));
}

#[test]
fn test_insert_column_shifts_only_relative_parts() {
    let mut wb = Workbook::new();
    let mut sheet = wb.sheet_mut(0).unwrap();
    sheet.set_input("B1", "2").unwrap();
    sheet.set_input("C1", "3").unwrap();
    sheet.set_input("D1", "=B1*C1+$B$1").unwrap();

    sheet.insert_columns(1, 1).unwrap();
    assert_eq!(sheet.column_count(), 27);
    assert_eq!(sheet.formula("E1").unwrap(), Some("=C1*D1+$B$1"));
    assert_eq!(sheet.value("E1").unwrap(), CellData::Number(6.0));

    sheet.delete_columns(2, 1).unwrap();
    assert_eq!(sheet.formula("D1").unwrap(), Some("=#REF!*C1+$B$1"));
    assert_eq!(sheet.value("D1").unwrap(), CellData::Error(CellError::Ref));
}

#[test]
fn test_delete_rows_shrinks_ranges() {
    let mut wb = Workbook::new();
    let mut sheet = wb.sheet_mut(0).unwrap();
    for row in 1..=5 {
        sheet.set_input(&format!("A{}", row), &row.to_string()).unwrap();
    }
    sheet.set_input("B1", "=SUM(A2:A4)").unwrap();
    sheet.set_input("B2", "=SUM(A3:A3)").unwrap();

    sheet.delete_rows(2, 2).unwrap();
    assert_eq!(sheet.formula("B1").unwrap(), Some("=SUM(A2:A2)"));
    assert_eq!(sheet.value("B1").unwrap(), CellData::Number(2.0));
    assert_eq!(sheet.formula("B2").unwrap(), Some("=SUM(#REF!)"));
    assert_eq!(sheet.value("A3").unwrap(), CellData::Number(5.0));
}

#[test]
fn test_filter_and_clear() {
    let mut wb = Workbook::new();
    let mut sheet = wb.sheet_mut(0).unwrap();
    for (row, qty) in ["5", "15", "25"].iter().enumerate() {
        sheet.set_input(&format!("A{}", row + 1), qty).unwrap();
    }
    let range = RangeRef::parse("A1:A3").unwrap();
    let hidden = sheet
        .filter(range, &GreaterThanCriterion::new(0, CellData::text("10")))
        .unwrap();
    assert_eq!(hidden, 1);
    assert!(sheet.worksheet().is_row_hidden(0));

    sheet.clear_filter(range).unwrap();
    assert_eq!(sheet.worksheet().hidden_rows().count(), 0);
}

#[test]
fn test_copy_paste_then_undo() {
    let mut wb = Workbook::new();
    let mut sheet = wb.sheet_mut(0).unwrap();
    sheet.set_input("A1", "1").unwrap();
    sheet.set_input("A2", "2").unwrap();
    sheet.set_input("B1", "=A1*10").unwrap();

    let mut clipboard = Clipboard::new();
    clipboard.copy(&wb, 0, RangeRef::parse("B1").unwrap()).unwrap();

    let mut paste = PasteCommand::new(clipboard, 0, CellRef::parse("B2").unwrap());
    assert!(paste.execute(&mut wb).unwrap());
    assert_eq!(wb.formula(0, 1, 1).unwrap(), Some("=A2*10"));
    assert_eq!(wb.value(0, 1, 1).unwrap(), CellData::Number(20.0));

    paste.unexecute(&mut wb).unwrap();
    assert_eq!(wb.formula(0, 1, 1).unwrap(), None);
}

#[test]
fn test_undo_stack_of_commands() {
    let mut wb = Workbook::new();
    let mut stack: Vec<Box<dyn Command>> = Vec::new();

    let mut commands: Vec<Box<dyn Command>> = vec![
        Box::new(SetCellCommand::new(0, CellRef::parse("A1").unwrap(), "4")),
        Box::new(SetCellCommand::new(0, CellRef::parse("A2").unwrap(), "=A1*A1")),
        Box::new(InsertRowBeforeCommand::new(0, 0, 1)),
        Box::new(DeleteColumnsCommand::new(0, 3, 2)),
    ];
    for mut cmd in commands.drain(..) {
        if cmd.execute(&mut wb).unwrap() {
            stack.push(cmd);
        }
    }
    assert_eq!(wb.formula(0, 2, 0).unwrap(), Some("=A2*A2"));
    assert_eq!(wb.value(0, 2, 0).unwrap(), CellData::Number(16.0));

    while let Some(mut cmd) = stack.pop() {
        cmd.unexecute(&mut wb).unwrap();
    }
    let ws = wb.worksheet(0).unwrap();
    assert_eq!(ws.cell_count(), 0);
    assert_eq!(ws.column_count(), 26);
    assert_eq!(ws.row_count(), 1000);
}
