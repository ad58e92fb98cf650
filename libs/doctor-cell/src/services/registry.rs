use tracing::{debug, info};

use crate::{Doctor, DoctorError, OpdStatus};

/// Roster of doctors for a session. Doctors are added at initialization only.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DoctorRegistry {
    doctors: Vec<Doctor>,
}

impl DoctorRegistry {
    pub fn new(doctors: Vec<Doctor>) -> Self {
        Self { doctors }
    }

    /// The clinic's default roster.
    pub fn seeded() -> Self {
        Self::new(vec![
            Doctor {
                id: "doc1".to_string(),
                name: "Dr. Sarah Johnson".to_string(),
                phone: "9999999991".to_string(),
                specialty: "Pediatrician".to_string(),
                hospital: "City Children Hospital".to_string(),
                avg_consultation_time: 10,
                current_opd_status: OpdStatus::Active,
                broadcast_message: None,
                experience_years: 10,
                rating: 4.9,
                reviews: 124,
                image_url: None,
            },
            Doctor {
                id: "doc2".to_string(),
                name: "Dr. Michael Chen".to_string(),
                phone: "9999999992".to_string(),
                specialty: "Cardiologist".to_string(),
                hospital: "St. Mary Heart Center".to_string(),
                avg_consultation_time: 15,
                current_opd_status: OpdStatus::Paused,
                broadcast_message: None,
                experience_years: 15,
                rating: 4.8,
                reviews: 98,
                image_url: None,
            },
            Doctor {
                id: "doc3".to_string(),
                name: "Dr. Emily White".to_string(),
                phone: "9999999993".to_string(),
                specialty: "General Physician".to_string(),
                hospital: "Downtown Medical".to_string(),
                avg_consultation_time: 12,
                current_opd_status: OpdStatus::Active,
                broadcast_message: None,
                experience_years: 8,
                rating: 4.7,
                reviews: 210,
                image_url: None,
            },
        ])
    }

    pub fn list(&self) -> &[Doctor] {
        &self.doctors
    }

    pub fn into_inner(self) -> Vec<Doctor> {
        self.doctors
    }

    pub fn get(&self, doctor_id: &str) -> Result<&Doctor, DoctorError> {
        self.doctors
            .iter()
            .find(|d| d.id == doctor_id)
            .ok_or_else(|| DoctorError::NotFound(doctor_id.to_string()))
    }

    pub fn find_by_phone(&self, phone: &str) -> Option<&Doctor> {
        let found = self.doctors.iter().find(|d| d.phone == phone);
        debug!("Doctor lookup by phone matched: {}", found.is_some());
        found
    }

    pub fn set_opd_status(
        &mut self,
        doctor_id: &str,
        status: OpdStatus,
        broadcast: Option<String>,
    ) -> Result<&Doctor, DoctorError> {
        let doctor = self.get_mut(doctor_id)?;
        doctor.apply_opd_status(status, broadcast);
        info!("Doctor {} OPD status set to {}", doctor_id, status);
        Ok(doctor)
    }

    pub fn set_avg_consultation_time(
        &mut self,
        doctor_id: &str,
        minutes: i64,
    ) -> Result<&Doctor, DoctorError> {
        let doctor = self.get_mut(doctor_id)?;
        doctor.apply_avg_consultation_time(minutes)?;
        info!("Doctor {} average consultation time set to {} min", doctor_id, minutes);
        Ok(doctor)
    }

    fn get_mut(&mut self, doctor_id: &str) -> Result<&mut Doctor, DoctorError> {
        self.doctors
            .iter_mut()
            .find(|d| d.id == doctor_id)
            .ok_or_else(|| DoctorError::NotFound(doctor_id.to_string()))
    }
}
