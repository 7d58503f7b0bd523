use rusqlite::Connection;

use super::error::SchedulingError;
use super::model::TeacherAssignment;

/// Exact, case-sensitive match on all three fields.
pub fn is_entitled(
    teacher_id: &str,
    class_id: &str,
    subject_id: &str,
    assignments: &[TeacherAssignment],
) -> bool {
    assignments.iter().any(|a| {
        a.teacher_id == teacher_id && a.class_id == class_id && a.subject_id == subject_id
    })
}

/// Source of a teacher's (subject, class) assignments. The scheduler only
/// reads it; the host keeps it in sync with the staff register.
pub trait StaffDirectory {
    fn assignments_for(&self, teacher_id: &str) -> Result<Vec<TeacherAssignment>, SchedulingError>;
}

pub struct SqliteStaffDirectory<'c> {
    conn: &'c Connection,
}

impl<'c> SqliteStaffDirectory<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    /// Replaces every assignment row of `teacher_id` in one transaction.
    pub fn replace_for_teacher(
        &self,
        teacher_id: &str,
        rows: &[(String, String)],
    ) -> Result<usize, SchedulingError> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "DELETE FROM teacher_assignments WHERE teacher_id = ?",
            [teacher_id],
        )?;
        let mut inserted = 0usize;
        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO teacher_assignments(teacher_id, subject_id, class_id)
                 VALUES(?, ?, ?)",
            )?;
            for (subject_id, class_id) in rows {
                inserted += stmt.execute((teacher_id, subject_id, class_id))?;
            }
        }
        tx.commit()?;
        Ok(inserted)
    }
}

impl StaffDirectory for SqliteStaffDirectory<'_> {
    fn assignments_for(&self, teacher_id: &str) -> Result<Vec<TeacherAssignment>, SchedulingError> {
        let mut stmt = self.conn.prepare(
            "SELECT teacher_id, subject_id, class_id
             FROM teacher_assignments
             WHERE teacher_id = ?
             ORDER BY class_id, subject_id",
        )?;
        let rows = stmt
            .query_map([teacher_id], |r| {
                Ok(TeacherAssignment {
                    teacher_id: r.get(0)?,
                    subject_id: r.get(1)?,
                    class_id: r.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

impl StaffDirectory for [TeacherAssignment] {
    fn assignments_for(&self, teacher_id: &str) -> Result<Vec<TeacherAssignment>, SchedulingError> {
        Ok(self
            .iter()
            .filter(|a| a.teacher_id == teacher_id)
            .cloned()
            .collect())
    }
}
